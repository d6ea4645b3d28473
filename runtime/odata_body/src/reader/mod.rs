//! The wire-format reader: turns the bytes of a request body into an [`ODataItem`].
//!
//! Readers are opaque to the rest of the pipeline. A [`ReaderFactory`] opens a
//! [`WireReader`] over the buffered body, and deserializers ask it for the item
//! shape they expect. [`JsonReaderFactory`] is the built-in implementation for
//! the OData JSON format.
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Uri};

pub use json::{JsonReaderFactory, JsonWireReader};

use crate::deserializer::DeserializerContext;
use crate::edm::EdmModel;
use crate::payload_kind::PayloadKind;
use crate::version::{DEFAULT_ODATA_VERSION, ODataVersion};

mod json;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Optional checks a reader performs on top of well-formedness.
    pub struct ValidationKinds: u8 {
        /// Reject properties that are not declared on a non-open type.
        const THROW_ON_UNDECLARED_PROPERTY = 1;
        /// Reject `@odata.type` annotations naming a type that is unknown, or that
        /// doesn't derive from the type the request path expects.
        const THROW_IF_TYPE_CONFLICTS_WITH_METADATA = 1 << 1;
    }
}

#[derive(Debug, Clone)]
/// How a [`WireReader`] should interpret the payload.
pub struct ReaderSettings {
    /// The URI relative links in the payload are resolved against.
    pub base_uri: Option<Uri>,
    pub validations: ValidationKinds,
    /// The protocol version the payload is read with.
    pub version: ODataVersion,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            base_uri: None,
            validations: ValidationKinds::all(),
            version: DEFAULT_ODATA_VERSION,
        }
    }
}

/// Opens [`WireReader`]s over buffered request bodies.
pub trait ReaderFactory: Send + Sync {
    /// Open a reader over `body`.
    ///
    /// It fails if the payload can't be read by this factory at all
    /// (e.g. a `Content-Type` it doesn't understand).
    fn open(
        &self,
        body: Bytes,
        headers: &HeaderMap,
        settings: ReaderSettings,
        model: Arc<EdmModel>,
    ) -> Result<Box<dyn WireReader>, WireError>;
}

/// A reader over a single request body.
///
/// Readers hold on to the payload until they are released.
/// The pipeline registers every reader for disposal as soon as it is opened.
pub trait WireReader: Send {
    /// Parse the payload as an item of the given kind.
    fn read(
        &mut self,
        kind: PayloadKind,
        context: &DeserializerContext<'_>,
    ) -> Result<ODataItem, WireError>;

    /// Release the resources held by the reader. Calling it twice is a no-op.
    fn release(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
/// The object graph a [`WireReader`] yields.
pub enum ODataItem {
    Resource(ODataResource),
    ResourceSet(Vec<ODataResource>),
    Property(serde_json::Value),
    Collection(Vec<serde_json::Value>),
    EntityReferenceLink(Uri),
    Parameters(serde_json::Map<String, serde_json::Value>),
}

impl ODataItem {
    pub fn kind(&self) -> PayloadKind {
        match self {
            ODataItem::Resource(_) => PayloadKind::Resource,
            ODataItem::ResourceSet(_) => PayloadKind::ResourceSet,
            ODataItem::Property(_) => PayloadKind::Property,
            ODataItem::Collection(_) => PayloadKind::Collection,
            ODataItem::EntityReferenceLink(_) => PayloadKind::EntityReferenceLink,
            ODataItem::Parameters(_) => PayloadKind::ActionParameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// A single entity or complex instance, stripped of its control information.
pub struct ODataResource {
    /// The type named by the `@odata.type` annotation, without the leading `#`.
    pub type_name: Option<String>,
    /// The entity id from `@odata.id`, resolved against the base URI.
    pub id: Option<Uri>,
    /// Property values, in payload order. Nested values are left untouched.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl ODataResource {
    /// The properties as a JSON object, ready to be handed to `serde`.
    pub fn into_json(self) -> serde_json::Value {
        serde_json::Value::Object(self.properties)
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The payload doesn't match what the reader was asked to read.
pub enum WireError {
    #[error(
        "The `Content-Type` header is missing. OData endpoints expect requests with a `Content-Type` header set to `application/json`, or another `application/*+json` MIME type"
    )]
    MissingContentType,
    #[error(
        "The `Content-Type` header was set to `{actual}`. OData endpoints expect requests with a `Content-Type` header set to `application/json`, or another `application/*+json` MIME type"
    )]
    ContentTypeMismatch { actual: String },
    #[error("The request body is not a well-formed JSON document.\n{0}")]
    MalformedPayload(#[source] serde_json::Error),
    #[error("Expected a {expected} payload, but the document is {found}")]
    UnexpectedShape {
        expected: PayloadKind,
        found: &'static str,
    },
    #[error("`{property}` is not a declared property of `{type_name}`, which is not an open type")]
    UndeclaredProperty { type_name: String, property: String },
    #[error("`{parameter}` is not a parameter of the `{action}` action")]
    UndeclaredParameter { action: String, parameter: String },
    #[error("The payload declares its type as `{actual}`, which is not compatible with `{expected}`")]
    TypeConflict { expected: String, actual: String },
    #[error("The `{annotation}` annotation in a {kind} payload must be a string, found {found}")]
    InvalidAnnotation {
        annotation: String,
        kind: PayloadKind,
        found: &'static str,
    },
    #[error("`{link}` is not a valid link")]
    InvalidLink { link: String },
    #[error("{kind} payloads can't be read from a request body")]
    UnsupportedPayloadKind { kind: PayloadKind },
    #[error("The reader has already consumed the payload")]
    AlreadyConsumed,
    #[error("The reader has been released")]
    Released,
}

/// A short description of a JSON value's shape, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
