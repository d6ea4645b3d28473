//! Deserializers turn the items yielded by a [`WireReader`] into values.
//!
//! There are two families:
//!
//! - native deserializers, bound to a Rust type and keyed by its [`TypeId`].
//!   They rely on `serde` to build the value.
//! - EDM deserializers, keyed by the shape of an EDM type. They produce an
//!   [`EdmValue`](crate::edm::EdmValue) and are only used when the caller asks
//!   for one and no native deserializer is registered for it ("typeless" reads).
//!
//! [`DeserializerRegistry`] holds both and [`DeserializerRegistry::classify`]
//! picks one for a request.
use std::any::{Any, TypeId};
use std::fmt;

pub use classify::{Classification, expected_payload_type};
pub use reference::EntityReferenceLinkDeserializer;
pub use registry::{DeserializerRegistry, EdmDeserializerKey};
pub use typed::{
    CollectionDeserializer, PropertyDeserializer, ResourceDeserializer, ResourceSetDeserializer,
};
pub use typeless::{
    EdmCollectionDeserializer, EdmPropertyDeserializer, EdmResourceDeserializer,
    EdmResourceSetDeserializer,
};

pub use crate::action::ActionParametersDeserializer;

use crate::edm::{EdmModel, EdmTypeReference};
use crate::path::ODataPath;
use crate::payload_kind::PayloadKind;
use crate::reader::{ODataItem, WireError, WireReader};
use crate::request::RequestHead;

mod classify;
mod reference;
mod registry;
mod typed;
pub(crate) mod typeless;

/// A routine that can read a payload of a given kind.
pub trait Deserializer: Send + Sync {
    /// The payload kind this deserializer asks the wire reader for.
    fn payload_kind(&self) -> PayloadKind;

    /// Read the payload and build a value.
    ///
    /// The returned value must be of the type the deserializer was registered for.
    fn read(
        &self,
        reader: &mut dyn WireReader,
        context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError>;
}

#[derive(Clone, Copy)]
/// The identity of a Rust type, with its name for diagnostics.
pub struct NativeType {
    id: TypeId,
    name: &'static str,
}

impl NativeType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for NativeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NativeType {}

/// Everything a deserializer knows about the read it is performing.
///
/// A context is built once per read and can't be modified afterwards.
#[derive(Debug)]
pub struct DeserializerContext<'a> {
    path: &'a ODataPath,
    model: &'a EdmModel,
    expected_type: Option<EdmTypeReference>,
    native_type: NativeType,
    request: &'a RequestHead,
}

impl<'a> DeserializerContext<'a> {
    pub fn new(
        path: &'a ODataPath,
        model: &'a EdmModel,
        expected_type: Option<EdmTypeReference>,
        native_type: NativeType,
        request: &'a RequestHead,
    ) -> Self {
        Self {
            path,
            model,
            expected_type,
            native_type,
            request,
        }
    }

    pub fn path(&self) -> &'a ODataPath {
        self.path
    }

    pub fn model(&self) -> &'a EdmModel {
        self.model
    }

    /// The EDM type the request path expects, if it could be resolved.
    pub fn expected_type(&self) -> Option<&EdmTypeReference> {
        self.expected_type.as_ref()
    }

    /// The Rust type the caller asked for.
    pub fn native_type(&self) -> NativeType {
        self.native_type
    }

    pub fn request(&self) -> &'a RequestHead {
        self.request
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// A deserializer failed to build a value out of the payload.
pub enum DeserializationError {
    #[error(transparent)]
    /// The wire reader rejected the payload.
    Wire(#[from] WireError),
    #[error(transparent)]
    /// See [`JsonDeserializationError`] for details.
    Json(#[from] JsonDeserializationError),
    #[error(transparent)]
    /// See [`UnexpectedItem`] for details.
    UnexpectedItem(#[from] UnexpectedItem),
    #[error(transparent)]
    /// See [`InvalidEdmValue`] for details.
    InvalidValue(#[from] InvalidEdmValue),
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to deserialize the payload as `{type_name}`.\n{source}")]
#[non_exhaustive]
/// The payload is well-formed, but it can't be deserialized into the target Rust type.
pub struct JsonDeserializationError {
    /// The name of the target Rust type.
    pub type_name: &'static str,
    #[source]
    pub(crate) source: serde_path_to_error::Error<serde_json::Error>,
}

impl JsonDeserializationError {
    /// Where in the payload deserialization failed, e.g. `Address.City`.
    pub fn path(&self) -> &serde_path_to_error::Path {
        self.source.path()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Expected the reader to yield a {expected} item, but it yielded a {found} item")]
#[non_exhaustive]
/// The wire reader yielded an item of a different kind than the one requested.
pub struct UnexpectedItem {
    pub expected: PayloadKind,
    pub found: PayloadKind,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid value at `{location}`: {reason}")]
#[non_exhaustive]
/// A value in the payload doesn't conform to the EDM type it was read as.
pub struct InvalidEdmValue {
    /// A JSONPath-like pointer to the offending value, e.g. `$.Tags[1]`.
    pub location: String,
    pub reason: String,
}

pub(crate) fn unexpected_item(expected: PayloadKind, found: &ODataItem) -> DeserializationError {
    UnexpectedItem {
        expected,
        found: found.kind(),
    }
    .into()
}

/// Deserialize a JSON value into `T`, keeping track of where it fails.
pub(crate) fn from_json<T>(value: serde_json::Value) -> Result<T, JsonDeserializationError>
where
    T: serde::de::DeserializeOwned,
{
    serde_path_to_error::deserialize(value).map_err(|source| JsonDeserializationError {
        type_name: std::any::type_name::<T>(),
        source,
    })
}
