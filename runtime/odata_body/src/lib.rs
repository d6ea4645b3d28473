//! # odata_body
//!
//! Deserialization of request bodies for OData endpoints.
//!
//! Given a request that routing has already resolved to an [`ODataPath`](path::ODataPath)
//! and an [`EdmModel`](edm::EdmModel), [`ODataInputFormatter`] works out the EDM type
//! the payload must conform to, picks a deserializer, reads the body and
//! hands back a value:
//!
//! - a Rust type, when a deserializer is registered for it in the
//!   [`DeserializerRegistry`];
//! - an [`EdmValue`](edm::EdmValue), when no Rust type is bound to the EDM type
//!   ("typeless" reads).
//!
//! A malformed payload never fails the request outright: the failure goes to an
//! [`ErrorSink`](pipeline::ErrorSink) and the read yields the default value
//! supplied by the caller. Host misconfiguration (no model, no path, a type
//! that can't be read) is reported as a [`ReadBodyError`](errors::ReadBodyError).
//!
//! [`ActionParameterBinder`] binds the parameters of an action invocation,
//! reading the body once per request.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use odata_body::edm::{EdmModel, EdmPrimitiveKind, EdmStructuredType, EdmTypeReference};
//! use odata_body::path::{ODataPath, PathSegment};
//! use odata_body::pipeline::TracingErrorSink;
//! use odata_body::request::ODataRequest;
//! use odata_body::{DeserializerRegistry, ODataInputFormatter, PayloadKinds};
//!
//! #[derive(Default, serde::Deserialize)]
//! struct Customer {
//!     #[serde(rename = "Name")]
//!     name: String,
//! }
//!
//! # async fn handle(request: http::Request<http_body_util::Full<bytes::Bytes>>) {
//! let mut model = EdmModel::new();
//! model.add_structured_type(
//!     EdmStructuredType::entity("Sales.Customer")
//!         .property("Name", EdmTypeReference::primitive(EdmPrimitiveKind::String)),
//! );
//!
//! let mut registry = DeserializerRegistry::with_defaults();
//! registry.register_resource::<Customer>();
//! let formatter = ODataInputFormatter::new(registry, PayloadKinds::default());
//!
//! let mut request = ODataRequest::new(request)
//!     .with_model(Arc::new(model))
//!     .with_path(ODataPath::new([PathSegment::EntitySet {
//!         name: "Customers".into(),
//!         entity_type: "Sales.Customer".into(),
//!     }]));
//! let customer = formatter
//!     .read(&mut request, Customer::default(), &mut TracingErrorSink)
//!     .await
//!     .unwrap();
//! # }
//! ```
pub use action::{ActionParameterBinder, ActionParameters, ModelBindingResult};
pub use deserializer::DeserializerRegistry;
pub use payload_kind::{PayloadKind, PayloadKinds};
pub use pipeline::ODataInputFormatter;
pub use version::{ODataVersion, VersionNegotiator};

pub mod action;
pub mod base_address;
#[cfg(feature = "config")]
pub mod config;
pub mod deserializer;
pub mod edm;
pub mod errors;
pub mod path;
mod payload_kind;
pub mod pipeline;
pub mod reader;
pub mod request;
pub mod version;
