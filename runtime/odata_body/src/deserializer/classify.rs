use std::any::TypeId;
use std::sync::Arc;

use super::{Deserializer, DeserializerRegistry, NativeType};
use crate::edm::{EdmModel, EdmTypeReference, EdmValue};
use crate::errors::UnsupportedType;
use crate::path::{ODataPath, PathSegment};
use crate::payload_kind::PayloadKind;

#[derive(Clone)]
/// The outcome of [`DeserializerRegistry::classify`].
pub struct Classification {
    expected_type: Option<EdmTypeReference>,
    deserializer: Arc<dyn Deserializer>,
}

impl Classification {
    /// The EDM type the request path expects, if any.
    pub fn expected_type(&self) -> Option<&EdmTypeReference> {
        self.expected_type.as_ref()
    }

    pub fn deserializer(&self) -> &Arc<dyn Deserializer> {
        &self.deserializer
    }

    pub fn payload_kind(&self) -> PayloadKind {
        self.deserializer.payload_kind()
    }

    pub(crate) fn into_parts(self) -> (Option<EdmTypeReference>, Arc<dyn Deserializer>) {
        (self.expected_type, self.deserializer)
    }
}

impl std::fmt::Debug for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classification")
            .field("expected_type", &self.expected_type)
            .field("payload_kind", &self.payload_kind())
            .finish()
    }
}

/// The EDM type a request body must conform to, derived from the request path alone.
///
/// A body sent to an entity set creates one of its members: the expected type is
/// the entity type, not the collection. Types the model doesn't declare are
/// treated as unknown.
pub fn expected_payload_type(path: &ODataPath, model: &EdmModel) -> Option<EdmTypeReference> {
    let expected = match path.last_segment()? {
        PathSegment::EntitySet { entity_type, .. } => EdmTypeReference::entity(entity_type.clone()),
        segment => segment.edm_type()?,
    };
    if !model.declares(&expected) {
        tracing::debug!(
            expected_type = %expected,
            "The request path targets a type that the EDM model doesn't declare"
        );
        return None;
    }
    Some(expected)
}

impl DeserializerRegistry {
    /// Pick the deserializer for a read of `native_type` on `path`.
    ///
    /// A deserializer registered for the Rust type always wins.
    /// The EDM type expected by the path is only used as a fallback, for
    /// typeless reads of [`EdmValue`].
    pub fn classify(
        &self,
        native_type: NativeType,
        path: &ODataPath,
        model: &EdmModel,
    ) -> Result<Classification, UnsupportedType> {
        let expected_type = expected_payload_type(path, model);
        let deserializer = match self.find_native(native_type) {
            Some(deserializer) => Some(deserializer),
            // EDM deserializers only ever produce `EdmValue`s.
            None if native_type.id() == TypeId::of::<EdmValue>() => expected_type
                .as_ref()
                .and_then(|expected| self.find_edm(expected)),
            None => None,
        };
        match deserializer {
            Some(deserializer) => Ok(Classification {
                expected_type,
                deserializer: deserializer.clone(),
            }),
            None => Err(UnsupportedType {
                type_name: native_type.name(),
            }),
        }
    }
}
