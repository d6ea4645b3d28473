use indexmap::IndexMap;

use super::EdmTypeReference;

/// Whether a structured type is an entity (has a key, can be addressed)
/// or a complex type (a bag of properties owned by something else).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKind {
    Entity,
    Complex,
}

#[derive(Debug, Clone)]
/// A declared property of a structured type.
pub struct EdmProperty {
    name: String,
    type_ref: EdmTypeReference,
}

impl EdmProperty {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_ref(&self) -> &EdmTypeReference {
        &self.type_ref
    }
}

#[derive(Debug, Clone)]
/// An entity or complex type declared in an [`EdmModel`].
///
/// ```rust
/// use odata_body::edm::{EdmPrimitiveKind, EdmStructuredType, EdmTypeReference};
///
/// let customer = EdmStructuredType::entity("Sales.Customer")
///     .key("Id")
///     .property("Id", EdmTypeReference::primitive(EdmPrimitiveKind::Int32))
///     .property("Name", EdmTypeReference::primitive(EdmPrimitiveKind::String));
/// assert!(customer.property_type("Name").is_some());
/// ```
pub struct EdmStructuredType {
    name: String,
    kind: StructuredKind,
    base_type: Option<String>,
    key: Vec<String>,
    properties: IndexMap<String, EdmProperty>,
    open: bool,
}

impl EdmStructuredType {
    pub fn entity(qualified_name: impl Into<String>) -> Self {
        Self::new(qualified_name.into(), StructuredKind::Entity)
    }

    pub fn complex(qualified_name: impl Into<String>) -> Self {
        Self::new(qualified_name.into(), StructuredKind::Complex)
    }

    fn new(name: String, kind: StructuredKind) -> Self {
        Self {
            name,
            kind,
            base_type: None,
            key: Vec::new(),
            properties: IndexMap::new(),
            open: false,
        }
    }

    pub fn key(mut self, property: impl Into<String>) -> Self {
        self.key.push(property.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, type_ref: EdmTypeReference) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            EdmProperty {
                name,
                type_ref,
            },
        );
        self
    }

    pub fn derives_from(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    /// Mark the type as open: instances may carry dynamic properties
    /// that are not part of its declaration.
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StructuredKind {
        self.kind
    }

    pub fn base_type(&self) -> Option<&str> {
        self.base_type.as_deref()
    }

    pub fn key_properties(&self) -> &[String] {
        &self.key
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The type of a property declared directly on this type.
    ///
    /// Use [`EdmModel::find_property`] to include inherited properties.
    pub fn property_type(&self, name: &str) -> Option<&EdmTypeReference> {
        self.properties.get(name).map(EdmProperty::type_ref)
    }

    pub fn declared_properties(&self) -> impl Iterator<Item = &EdmProperty> {
        self.properties.values()
    }

    /// A reference to this type.
    pub fn to_type_reference(&self) -> EdmTypeReference {
        match self.kind {
            StructuredKind::Entity => EdmTypeReference::entity(self.name.clone()),
            StructuredKind::Complex => EdmTypeReference::complex(self.name.clone()),
        }
    }
}

#[derive(Debug, Clone)]
/// An enumeration type: a closed set of named members.
pub struct EdmEnumType {
    name: String,
    members: IndexMap<String, i64>,
}

impl EdmEnumType {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            name: qualified_name.into(),
            members: IndexMap::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member_value(&self, name: &str) -> Option<i64> {
        self.members.get(name).copied()
    }
}

#[derive(Debug, Clone)]
/// An operation that can be invoked with a `POST` carrying its parameters in the body.
pub struct EdmAction {
    name: String,
    parameters: IndexMap<String, EdmTypeReference>,
    return_type: Option<EdmTypeReference>,
}

impl EdmAction {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            name: qualified_name.into(),
            parameters: IndexMap::new(),
            return_type: None,
        }
    }

    pub fn parameter(mut self, name: impl Into<String>, type_ref: EdmTypeReference) -> Self {
        self.parameters.insert(name.into(), type_ref);
        self
    }

    pub fn returns(mut self, type_ref: EdmTypeReference) -> Self {
        self.return_type = Some(type_ref);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_type(&self, name: &str) -> Option<&EdmTypeReference> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &EdmTypeReference)> {
        self.parameters.iter().map(|(name, t)| (name.as_str(), t))
    }

    pub fn return_type(&self) -> Option<&EdmTypeReference> {
        self.return_type.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
/// A snapshot of the service's Entity Data Model.
///
/// The model is immutable once it has been handed to a request:
/// share it behind an [`Arc`](std::sync::Arc).
pub struct EdmModel {
    structured_types: IndexMap<String, EdmStructuredType>,
    enum_types: IndexMap<String, EdmEnumType>,
    entity_sets: IndexMap<String, String>,
    actions: IndexMap<String, EdmAction>,
}

impl EdmModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_structured_type(&mut self, t: EdmStructuredType) -> &mut Self {
        self.structured_types.insert(t.name.clone(), t);
        self
    }

    pub fn add_enum_type(&mut self, t: EdmEnumType) -> &mut Self {
        self.enum_types.insert(t.name.clone(), t);
        self
    }

    pub fn add_entity_set(
        &mut self,
        name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> &mut Self {
        self.entity_sets.insert(name.into(), entity_type.into());
        self
    }

    pub fn add_action(&mut self, action: EdmAction) -> &mut Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn find_structured_type(&self, qualified_name: &str) -> Option<&EdmStructuredType> {
        self.structured_types.get(qualified_name)
    }

    pub fn find_enum_type(&self, qualified_name: &str) -> Option<&EdmEnumType> {
        self.enum_types.get(qualified_name)
    }

    /// The qualified name of the entity type exposed by an entity set.
    pub fn entity_set_type(&self, entity_set: &str) -> Option<&str> {
        self.entity_sets.get(entity_set).map(String::as_str)
    }

    /// Look up an action by its qualified name, or by its unqualified name if
    /// there is no ambiguity.
    pub fn find_action(&self, name: &str) -> Option<&EdmAction> {
        if let Some(action) = self.actions.get(name) {
            return Some(action);
        }
        let mut candidates = self
            .actions
            .values()
            .filter(|a| a.name.rsplit('.').next() == Some(name));
        match (candidates.next(), candidates.next()) {
            (Some(action), None) => Some(action),
            _ => None,
        }
    }

    /// `true` if the model declares the structured or enum type this reference points at.
    ///
    /// Primitive and untyped references are always known; collections are known
    /// if their element type is.
    pub fn declares(&self, type_ref: &EdmTypeReference) -> bool {
        match type_ref.element_type() {
            Some(element) => self.declares(element),
            None => match type_ref.named_type() {
                Some(name) => {
                    self.structured_types.contains_key(name) || self.enum_types.contains_key(name)
                }
                None => true,
            },
        }
    }

    /// Find a property declared on a structured type or on one of its ancestors.
    pub fn find_property(&self, type_name: &str, property: &str) -> Option<&EdmTypeReference> {
        self.ancestry(type_name).find_map(|t| t.property_type(property))
    }

    /// `true` if the structured type, or any of its ancestors, is open.
    pub fn is_open(&self, type_name: &str) -> bool {
        self.ancestry(type_name).any(EdmStructuredType::is_open)
    }

    /// `true` if `candidate` is `type_name` or one of its descendants.
    pub fn is_assignable(&self, candidate: &str, type_name: &str) -> bool {
        self.ancestry(candidate).any(|t| t.name == type_name)
    }

    /// The type itself, followed by its base types, nearest first.
    fn ancestry<'a>(
        &'a self,
        type_name: &str,
    ) -> impl Iterator<Item = &'a EdmStructuredType> + use<'a> {
        let mut next = self.structured_types.get(type_name);
        // Guard against inheritance cycles in hand-written models.
        let mut remaining = self.structured_types.len();
        std::iter::from_fn(move || {
            let current = next.take()?;
            remaining = remaining.checked_sub(1)?;
            next = current
                .base_type
                .as_deref()
                .and_then(|base| self.structured_types.get(base));
            Some(current)
        })
    }
}
