//! A minimal Entity Data Model: the type system OData payloads are checked against.
//!
//! The model is described by hand through [`EdmModel`]'s builder methods;
//! it is shared, read-only, by every request that targets the service.
pub use model::{
    EdmAction, EdmEnumType, EdmModel, EdmProperty, EdmStructuredType, StructuredKind,
};
pub use types::{EdmPrimitiveKind, EdmType, EdmTypeKind, EdmTypeReference, UnknownPrimitiveType};
pub use value::{EdmStructuredValue, EdmValue};

mod model;
mod types;
mod value;
