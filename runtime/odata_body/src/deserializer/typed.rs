//! Native deserializers, backed by `serde`.
use std::any::Any;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::{DeserializationError, Deserializer, DeserializerContext, from_json, unexpected_item};
use crate::payload_kind::PayloadKind;
use crate::reader::{ODataItem, WireReader};

/// Read a single entity or complex instance into `T`.
///
/// Control information (`@odata.type`, `@odata.id`, annotations) is stripped
/// before `T` sees the properties.
pub struct ResourceDeserializer<T>(PhantomData<fn() -> T>);

/// Read a resource set (`{"value": [...]}`) into a `Vec<T>`.
pub struct ResourceSetDeserializer<T>(PhantomData<fn() -> T>);

/// Read a single property value (`{"value": ...}`) into `T`.
pub struct PropertyDeserializer<T>(PhantomData<fn() -> T>);

/// Read a collection of non-entity values (`{"value": [...]}`) into a `Vec<T>`.
pub struct CollectionDeserializer<T>(PhantomData<fn() -> T>);

macro_rules! impl_new {
    ($($name:ident),*) => {
        $(
            impl<T> $name<T> {
                pub fn new() -> Self {
                    Self(PhantomData)
                }
            }

            impl<T> Default for $name<T> {
                fn default() -> Self {
                    Self::new()
                }
            }
        )*
    };
}

impl_new!(
    ResourceDeserializer,
    ResourceSetDeserializer,
    PropertyDeserializer,
    CollectionDeserializer
);

impl<T> Deserializer for ResourceDeserializer<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Resource
    }

    fn read(
        &self,
        reader: &mut dyn WireReader,
        context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError> {
        let resource = match reader.read(self.payload_kind(), context)? {
            ODataItem::Resource(resource) => resource,
            other => return Err(unexpected_item(self.payload_kind(), &other)),
        };
        let value: T = from_json(resource.into_json())?;
        Ok(Box::new(value))
    }
}

impl<T> Deserializer for ResourceSetDeserializer<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::ResourceSet
    }

    fn read(
        &self,
        reader: &mut dyn WireReader,
        context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError> {
        let resources = match reader.read(self.payload_kind(), context)? {
            ODataItem::ResourceSet(resources) => resources,
            other => return Err(unexpected_item(self.payload_kind(), &other)),
        };
        let items = resources.into_iter().map(|r| r.into_json()).collect();
        let values: Vec<T> = from_json(serde_json::Value::Array(items))?;
        Ok(Box::new(values))
    }
}

impl<T> Deserializer for PropertyDeserializer<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Property
    }

    fn read(
        &self,
        reader: &mut dyn WireReader,
        context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError> {
        let value = match reader.read(self.payload_kind(), context)? {
            ODataItem::Property(value) => value,
            other => return Err(unexpected_item(self.payload_kind(), &other)),
        };
        let value: T = from_json(value)?;
        Ok(Box::new(value))
    }
}

impl<T> Deserializer for CollectionDeserializer<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Collection
    }

    fn read(
        &self,
        reader: &mut dyn WireReader,
        context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError> {
        let items = match reader.read(self.payload_kind(), context)? {
            ODataItem::Collection(items) => items,
            other => return Err(unexpected_item(self.payload_kind(), &other)),
        };
        let values: Vec<T> = from_json(serde_json::Value::Array(items))?;
        Ok(Box::new(values))
    }
}
