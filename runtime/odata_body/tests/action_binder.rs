use std::sync::Arc;

use odata_body::edm::EdmValue;
use odata_body::errors::BodyReadFailure;
use odata_body::{
    ActionParameterBinder, DeserializerRegistry, ModelBindingResult, ODataInputFormatter,
    PayloadKinds,
};

mod common;

use common::{CountingReaderFactory, register_action, request};

fn binder(registry: DeserializerRegistry, factory: &CountingReaderFactory) -> ActionParameterBinder {
    let formatter = ODataInputFormatter::new(registry, PayloadKinds::default())
        .with_reader_factory(factory.clone());
    ActionParameterBinder::new(Arc::new(formatter))
}

#[tokio::test]
async fn parameters_missing_from_the_payload_bind_to_no_result() {
    let factory = CountingReaderFactory::default();
    let binder = binder(DeserializerRegistry::with_defaults(), &factory);
    let mut request = request(r#"{"name": "Alice"}"#, register_action());
    let mut reported = 0;
    let mut sink = |_: &BodyReadFailure| reported += 1;

    let name = binder.bind(&mut request, "name", &mut sink).await.unwrap();
    assert_eq!(name, ModelBindingResult::Success(&EdmValue::from("Alice")));

    let age = binder.bind(&mut request, "age", &mut sink).await.unwrap();
    assert_eq!(age, ModelBindingResult::NoResult);

    drop(sink);
    assert_eq!(reported, 0);
}

#[tokio::test]
async fn the_body_is_read_once_per_request() {
    let factory = CountingReaderFactory::default();
    let binder = binder(DeserializerRegistry::with_defaults(), &factory);
    let mut request = request(r#"{"name": "Alice", "age": 30}"#, register_action());

    for _ in 0..2 {
        let age = binder
            .bind(&mut request, "age", &mut |_: &BodyReadFailure| {})
            .await
            .unwrap()
            .value()
            .cloned();
        assert_eq!(age, Some(EdmValue::Integer(30)));
    }
    assert_eq!(factory.opened(), 1);
    assert_eq!(factory.released(), 1);
    assert_eq!(request.features().action_parameters().map(|p| p.len()), Some(2));
}

#[tokio::test]
async fn without_an_action_parameters_deserializer_nothing_binds() {
    let factory = CountingReaderFactory::default();
    let binder = binder(DeserializerRegistry::new(), &factory);
    let mut request = request(r#"{"name": "Alice"}"#, register_action());

    let name = binder
        .bind(&mut request, "name", &mut |_: &BodyReadFailure| {})
        .await
        .unwrap();
    assert_eq!(name, ModelBindingResult::NoResult);
    assert_eq!(factory.opened(), 0);
}

#[tokio::test]
async fn invalid_payloads_are_reported_once() {
    let factory = CountingReaderFactory::default();
    let binder = binder(DeserializerRegistry::with_defaults(), &factory);
    let mut request = request(r#"{"name": "Alice", "age": "thirty"}"#, register_action());
    let mut failures = Vec::new();
    let mut sink = |f: &BodyReadFailure| failures.push(f.to_string());

    for name in ["name", "age"] {
        let result = binder.bind(&mut request, name, &mut sink).await.unwrap();
        assert_eq!(result, ModelBindingResult::NoResult);
    }

    drop(sink);
    insta::assert_snapshot!(failures.join("\n"), @"Invalid value at `$.age`: expected a value of type `Edm.Int32`, found a string");
    assert_eq!(factory.opened(), 1);
}

#[tokio::test]
async fn undeclared_parameters_are_rejected() {
    let factory = CountingReaderFactory::default();
    let binder = binder(DeserializerRegistry::with_defaults(), &factory);
    let mut request = request(r#"{"name": "Alice", "email": "alice@example.com"}"#, register_action());
    let mut failures = Vec::new();

    let name = binder
        .bind(&mut request, "name", &mut |f: &BodyReadFailure| {
            failures.push(f.to_string())
        })
        .await
        .unwrap();
    assert_eq!(name, ModelBindingResult::NoResult);
    insta::assert_snapshot!(failures.join("\n"), @"`email` is not a parameter of the `Sales.Register` action");
}
