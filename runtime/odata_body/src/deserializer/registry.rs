use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use http::Uri;

use super::{
    ActionParametersDeserializer, CollectionDeserializer, Deserializer,
    EdmCollectionDeserializer, EdmPropertyDeserializer, EdmResourceDeserializer,
    EdmResourceSetDeserializer, EntityReferenceLinkDeserializer, NativeType, PropertyDeserializer,
    ResourceDeserializer, ResourceSetDeserializer,
};
use crate::action::ActionParameters;
use crate::edm::{EdmType, EdmTypeKind, EdmTypeReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The shape of an EDM type, as far as typeless deserialization is concerned.
pub enum EdmDeserializerKey {
    Entity,
    Complex,
    Primitive,
    Enum,
    Untyped,
    /// A collection of entities, i.e. a resource set.
    EntityCollection,
    /// A collection of primitive, enum or complex values.
    Collection,
}

impl EdmDeserializerKey {
    pub fn of(type_ref: &EdmTypeReference) -> Self {
        match type_ref.definition() {
            EdmType::Entity(_) => EdmDeserializerKey::Entity,
            EdmType::Complex(_) => EdmDeserializerKey::Complex,
            EdmType::Primitive(_) => EdmDeserializerKey::Primitive,
            EdmType::Enum(_) => EdmDeserializerKey::Enum,
            EdmType::Untyped => EdmDeserializerKey::Untyped,
            EdmType::Collection(element) if element.kind() == EdmTypeKind::Entity => {
                EdmDeserializerKey::EntityCollection
            }
            EdmType::Collection(_) => EdmDeserializerKey::Collection,
        }
    }
}

#[derive(Clone, Default)]
/// The deserializers available to an [`ODataInputFormatter`].
///
/// Lookups happen in two stages: first by the [`TypeId`] of the Rust type the
/// caller asked for, then, for [`EdmValue`](crate::edm::EdmValue) reads with
/// nothing registered, by the shape of the EDM type the request path resolves to.
/// The registry is populated at startup and read-only afterwards.
///
/// [`ODataInputFormatter`]: crate::pipeline::ODataInputFormatter
pub struct DeserializerRegistry {
    native: HashMap<TypeId, (NativeType, Arc<dyn Deserializer>)>,
    edm: HashMap<EdmDeserializerKey, Arc<dyn Deserializer>>,
}

impl DeserializerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in deserializers:
    ///
    /// - [`http::Uri`] for entity reference links;
    /// - [`ActionParameters`] for action invocations;
    /// - a typeless deserializer for every EDM type shape.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register_native::<Uri>(EntityReferenceLinkDeserializer)
            .register_native::<ActionParameters>(ActionParametersDeserializer)
            .register_edm(EdmDeserializerKey::Entity, EdmResourceDeserializer)
            .register_edm(EdmDeserializerKey::Complex, EdmResourceDeserializer)
            .register_edm(EdmDeserializerKey::EntityCollection, EdmResourceSetDeserializer)
            .register_edm(EdmDeserializerKey::Collection, EdmCollectionDeserializer)
            .register_edm(EdmDeserializerKey::Primitive, EdmPropertyDeserializer)
            .register_edm(EdmDeserializerKey::Enum, EdmPropertyDeserializer)
            .register_edm(EdmDeserializerKey::Untyped, EdmPropertyDeserializer);
        registry
    }

    /// Register the deserializer for values of type `T`.
    ///
    /// `deserializer` must produce values of type `T`.
    /// It replaces any deserializer previously registered for `T`.
    pub fn register_native<T: 'static>(
        &mut self,
        deserializer: impl Deserializer + 'static,
    ) -> &mut Self {
        let native_type = NativeType::of::<T>();
        self.native
            .insert(native_type.id(), (native_type, Arc::new(deserializer)));
        self
    }

    /// Read `T` from a single entity or complex instance.
    pub fn register_resource<T>(&mut self) -> &mut Self
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        self.register_native::<T>(ResourceDeserializer::<T>::new())
    }

    /// Read `Vec<T>` from a resource set.
    pub fn register_resource_set<T>(&mut self) -> &mut Self
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        self.register_native::<Vec<T>>(ResourceSetDeserializer::<T>::new())
    }

    /// Read `T` from a single property value.
    pub fn register_property<T>(&mut self) -> &mut Self
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        self.register_native::<T>(PropertyDeserializer::<T>::new())
    }

    /// Read `Vec<T>` from a collection of non-entity values.
    ///
    /// It shares its key with [`register_resource_set`](Self::register_resource_set):
    /// the last registration for `Vec<T>` wins.
    pub fn register_collection<T>(&mut self) -> &mut Self
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        self.register_native::<Vec<T>>(CollectionDeserializer::<T>::new())
    }

    /// Register the typeless deserializer for a shape of EDM types.
    ///
    /// `deserializer` must produce [`EdmValue`](crate::edm::EdmValue)s: it is only
    /// selected for reads that ask for one.
    pub fn register_edm(
        &mut self,
        key: EdmDeserializerKey,
        deserializer: impl Deserializer + 'static,
    ) -> &mut Self {
        self.edm.insert(key, Arc::new(deserializer));
        self
    }

    pub fn find_native(&self, native_type: NativeType) -> Option<&Arc<dyn Deserializer>> {
        self.native.get(&native_type.id()).map(|(_, d)| d)
    }

    pub fn find_edm(&self, type_ref: &EdmTypeReference) -> Option<&Arc<dyn Deserializer>> {
        self.edm.get(&EdmDeserializerKey::of(type_ref))
    }

    /// `true` if a native deserializer is registered for `T`.
    pub fn supports<T: 'static>(&self) -> bool {
        self.native.contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for DeserializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let native: Vec<_> = self.native.values().map(|(t, _)| t.name()).collect();
        let edm: Vec<_> = self.edm.keys().collect();
        f.debug_struct("DeserializerRegistry")
            .field("native", &native)
            .field("edm", &edm)
            .finish()
    }
}
