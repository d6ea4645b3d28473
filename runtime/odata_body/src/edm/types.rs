use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// The coarse classification of a type in the Entity Data Model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdmTypeKind {
    Primitive,
    Entity,
    Complex,
    Enum,
    Collection,
    Untyped,
}

/// The primitive types defined by the OData CSDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdmPrimitiveKind {
    Binary,
    Boolean,
    Byte,
    Date,
    DateTimeOffset,
    Decimal,
    Double,
    Duration,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    String,
    TimeOfDay,
}

impl EdmPrimitiveKind {
    /// The qualified name of the primitive type, e.g. `Edm.Int32`.
    pub fn qualified_name(self) -> &'static str {
        match self {
            EdmPrimitiveKind::Binary => "Edm.Binary",
            EdmPrimitiveKind::Boolean => "Edm.Boolean",
            EdmPrimitiveKind::Byte => "Edm.Byte",
            EdmPrimitiveKind::Date => "Edm.Date",
            EdmPrimitiveKind::DateTimeOffset => "Edm.DateTimeOffset",
            EdmPrimitiveKind::Decimal => "Edm.Decimal",
            EdmPrimitiveKind::Double => "Edm.Double",
            EdmPrimitiveKind::Duration => "Edm.Duration",
            EdmPrimitiveKind::Guid => "Edm.Guid",
            EdmPrimitiveKind::Int16 => "Edm.Int16",
            EdmPrimitiveKind::Int32 => "Edm.Int32",
            EdmPrimitiveKind::Int64 => "Edm.Int64",
            EdmPrimitiveKind::SByte => "Edm.SByte",
            EdmPrimitiveKind::Single => "Edm.Single",
            EdmPrimitiveKind::String => "Edm.String",
            EdmPrimitiveKind::TimeOfDay => "Edm.TimeOfDay",
        }
    }

    /// The inclusive range of values for integral kinds, `None` otherwise.
    pub(crate) fn integral_range(self) -> Option<(i64, i64)> {
        match self {
            EdmPrimitiveKind::Byte => Some((u8::MIN.into(), u8::MAX.into())),
            EdmPrimitiveKind::SByte => Some((i8::MIN.into(), i8::MAX.into())),
            EdmPrimitiveKind::Int16 => Some((i16::MIN.into(), i16::MAX.into())),
            EdmPrimitiveKind::Int32 => Some((i32::MIN.into(), i32::MAX.into())),
            EdmPrimitiveKind::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl FromStr for EdmPrimitiveKind {
    type Err = UnknownPrimitiveType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.strip_prefix("Edm.").unwrap_or(s) {
            "Binary" => EdmPrimitiveKind::Binary,
            "Boolean" => EdmPrimitiveKind::Boolean,
            "Byte" => EdmPrimitiveKind::Byte,
            "Date" => EdmPrimitiveKind::Date,
            "DateTimeOffset" => EdmPrimitiveKind::DateTimeOffset,
            "Decimal" => EdmPrimitiveKind::Decimal,
            "Double" => EdmPrimitiveKind::Double,
            "Duration" => EdmPrimitiveKind::Duration,
            "Guid" => EdmPrimitiveKind::Guid,
            "Int16" => EdmPrimitiveKind::Int16,
            "Int32" => EdmPrimitiveKind::Int32,
            "Int64" => EdmPrimitiveKind::Int64,
            "SByte" => EdmPrimitiveKind::SByte,
            "Single" => EdmPrimitiveKind::Single,
            "String" => EdmPrimitiveKind::String,
            "TimeOfDay" => EdmPrimitiveKind::TimeOfDay,
            _ => {
                return Err(UnknownPrimitiveType {
                    name: s.to_owned(),
                });
            }
        };
        Ok(kind)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("`{name}` is not a primitive type of the Entity Data Model")]
#[non_exhaustive]
/// The name passed to [`EdmPrimitiveKind::from_str`] doesn't match any primitive type.
pub struct UnknownPrimitiveType {
    /// The name that failed to parse.
    pub name: String,
}

/// The definition a [`EdmTypeReference`] points at.
///
/// Structured and enum types are referenced by their qualified name;
/// use [`EdmModel`](super::EdmModel) to look up their declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdmType {
    Primitive(EdmPrimitiveKind),
    Entity(String),
    Complex(String),
    Enum(String),
    Collection(Box<EdmTypeReference>),
    Untyped,
}

/// A (possibly nullable) reference to a type in the Entity Data Model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdmTypeReference {
    definition: EdmType,
    nullable: bool,
}

impl EdmTypeReference {
    pub fn new(definition: EdmType, nullable: bool) -> Self {
        Self {
            definition,
            nullable,
        }
    }

    pub fn primitive(kind: EdmPrimitiveKind) -> Self {
        Self::new(EdmType::Primitive(kind), true)
    }

    pub fn entity(qualified_name: impl Into<String>) -> Self {
        Self::new(EdmType::Entity(qualified_name.into()), true)
    }

    pub fn complex(qualified_name: impl Into<String>) -> Self {
        Self::new(EdmType::Complex(qualified_name.into()), true)
    }

    pub fn enumeration(qualified_name: impl Into<String>) -> Self {
        Self::new(EdmType::Enum(qualified_name.into()), true)
    }

    pub fn collection(element: EdmTypeReference) -> Self {
        Self::new(EdmType::Collection(Box::new(element)), true)
    }

    pub fn untyped() -> Self {
        Self::new(EdmType::Untyped, true)
    }

    /// Return a copy of this reference with the given nullability.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn definition(&self) -> &EdmType {
        &self.definition
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn kind(&self) -> EdmTypeKind {
        match &self.definition {
            EdmType::Primitive(_) => EdmTypeKind::Primitive,
            EdmType::Entity(_) => EdmTypeKind::Entity,
            EdmType::Complex(_) => EdmTypeKind::Complex,
            EdmType::Enum(_) => EdmTypeKind::Enum,
            EdmType::Collection(_) => EdmTypeKind::Collection,
            EdmType::Untyped => EdmTypeKind::Untyped,
        }
    }

    /// The element type, if this is a collection.
    pub fn element_type(&self) -> Option<&EdmTypeReference> {
        match &self.definition {
            EdmType::Collection(element) => Some(element),
            _ => None,
        }
    }

    /// `true` for entity types and collections of entity types.
    pub fn is_entity_like(&self) -> bool {
        match &self.definition {
            EdmType::Entity(_) => true,
            EdmType::Collection(element) => element.kind() == EdmTypeKind::Entity,
            _ => false,
        }
    }

    /// The qualified name of the structured or enum type this reference points at.
    ///
    /// Returns `None` for primitives, collections and `Edm.Untyped`.
    pub fn named_type(&self) -> Option<&str> {
        match &self.definition {
            EdmType::Entity(name) | EdmType::Complex(name) | EdmType::Enum(name) => Some(name),
            _ => None,
        }
    }

    /// The name used by CSDL to refer to this type, e.g. `Collection(NS.Customer)`.
    pub fn qualified_name(&self) -> Cow<'_, str> {
        match &self.definition {
            EdmType::Primitive(kind) => Cow::Borrowed(kind.qualified_name()),
            EdmType::Entity(name) | EdmType::Complex(name) | EdmType::Enum(name) => {
                Cow::Borrowed(name)
            }
            EdmType::Collection(element) => {
                Cow::Owned(format!("Collection({})", element.qualified_name()))
            }
            EdmType::Untyped => Cow::Borrowed("Edm.Untyped"),
        }
    }
}

impl fmt::Display for EdmTypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_nest() {
        let t = EdmTypeReference::collection(EdmTypeReference::entity("Sales.Customer"));
        assert_eq!(t.to_string(), "Collection(Sales.Customer)");
        assert_eq!(t.kind(), EdmTypeKind::Collection);
        assert!(t.is_entity_like());
        assert_eq!(t.element_type().unwrap().named_type(), Some("Sales.Customer"));
    }

    #[test]
    fn primitive_names_round_trip_with_or_without_prefix() {
        assert_eq!(
            "Edm.Int32".parse::<EdmPrimitiveKind>().unwrap(),
            EdmPrimitiveKind::Int32
        );
        assert_eq!(
            "Guid".parse::<EdmPrimitiveKind>().unwrap(),
            EdmPrimitiveKind::Guid
        );
        let err = "Edm.Float".parse::<EdmPrimitiveKind>().unwrap_err();
        insta::assert_snapshot!(err, @"`Edm.Float` is not a primitive type of the Entity Data Model");
    }
}
