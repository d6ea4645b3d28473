#![allow(dead_code)]
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderMap;
use http_body_util::Full;
use odata_body::PayloadKind;
use odata_body::deserializer::{DeserializationError, Deserializer, DeserializerContext};
use odata_body::errors::BodyReadFailure;
use odata_body::edm::{EdmAction, EdmModel, EdmPrimitiveKind, EdmStructuredType, EdmTypeReference};
use odata_body::path::{ODataPath, PathSegment};
use odata_body::reader::{
    JsonReaderFactory, ODataItem, ReaderFactory, ReaderSettings, WireError, WireReader,
};
use odata_body::request::ODataRequest;

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct Customer {
    #[serde(rename = "Id")]
    pub id: i32,
    #[serde(rename = "Name")]
    pub name: String,
}

pub fn model() -> Arc<EdmModel> {
    let mut model = EdmModel::new();
    model
        .add_structured_type(
            EdmStructuredType::entity("Sales.Customer")
                .key("Id")
                .property(
                    "Id",
                    EdmTypeReference::primitive(EdmPrimitiveKind::Int32).with_nullable(false),
                )
                .property("Name", EdmTypeReference::primitive(EdmPrimitiveKind::String)),
        )
        .add_structured_type(EdmStructuredType::entity("Sales.Order").key("Id"))
        .add_entity_set("Customers", "Sales.Customer")
        .add_action(
            EdmAction::new("Sales.Register")
                .parameter("name", EdmTypeReference::primitive(EdmPrimitiveKind::String))
                .parameter("age", EdmTypeReference::primitive(EdmPrimitiveKind::Int32)),
        );
    Arc::new(model)
}

pub fn customers() -> ODataPath {
    ODataPath::new([PathSegment::EntitySet {
        name: "Customers".into(),
        entity_type: "Sales.Customer".into(),
    }])
}

pub fn register_action() -> ODataPath {
    customers()
        .push(PathSegment::Key {
            entity_type: "Sales.Customer".into(),
        })
        .push(PathSegment::Action {
            name: "Sales.Register".into(),
        })
}

/// A JSON request carrying `body`, routed to `path`.
pub fn request(body: &'static str, path: ODataPath) -> ODataRequest {
    let request = http::Request::builder()
        .method(http::Method::POST)
        .uri("/odata/Customers")
        .header(http::header::HOST, "example.com")
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, body.len())
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap();
    ODataRequest::new(request)
        .with_model(model())
        .with_path(path)
}

/// An error sink for reads that are expected to succeed.
pub fn no_failures(failure: &BodyReadFailure) {
    panic!("Unexpected failure: {failure}")
}

/// A deserializer that counts how many times it's invoked.
pub struct CountingDeserializer(pub Arc<AtomicUsize>);

impl Deserializer for CountingDeserializer {
    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Resource
    }

    fn read(
        &self,
        _reader: &mut dyn WireReader,
        _context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Customer::default()))
    }
}

#[derive(Clone, Default)]
/// A JSON reader factory that keeps track of the readers it opens and releases.
pub struct CountingReaderFactory {
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl CountingReaderFactory {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ReaderFactory for CountingReaderFactory {
    fn open(
        &self,
        body: Bytes,
        headers: &HeaderMap,
        settings: ReaderSettings,
        model: Arc<EdmModel>,
    ) -> Result<Box<dyn WireReader>, WireError> {
        let inner = JsonReaderFactory.open(body, headers, settings, model)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingReader {
            inner,
            released: self.released.clone(),
        }))
    }
}

struct CountingReader {
    inner: Box<dyn WireReader>,
    released: Arc<AtomicUsize>,
}

impl WireReader for CountingReader {
    fn read(
        &mut self,
        kind: PayloadKind,
        context: &DeserializerContext<'_>,
    ) -> Result<ODataItem, WireError> {
        self.inner.read(kind, context)
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release();
    }
}
