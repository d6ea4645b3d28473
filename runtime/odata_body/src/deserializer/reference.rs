use std::any::Any;

use super::{DeserializationError, Deserializer, DeserializerContext, unexpected_item};
use crate::payload_kind::PayloadKind;
use crate::reader::{ODataItem, WireReader};

#[derive(Debug, Clone, Copy, Default)]
/// Read an entity reference link (`{"@odata.id": "..."}`) into an [`http::Uri`].
///
/// Relative links are resolved against the service root by the wire reader.
pub struct EntityReferenceLinkDeserializer;

impl Deserializer for EntityReferenceLinkDeserializer {
    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::EntityReferenceLink
    }

    fn read(
        &self,
        reader: &mut dyn WireReader,
        context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError> {
        match reader.read(self.payload_kind(), context)? {
            ODataItem::EntityReferenceLink(uri) => Ok(Box::new(uri)),
            other => Err(unexpected_item(self.payload_kind(), &other)),
        }
    }
}
