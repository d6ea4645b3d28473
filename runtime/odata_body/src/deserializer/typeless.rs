//! EDM deserializers: read a payload against an EDM type, without a Rust type to bind it to.
use std::any::Any;

use serde_json::{Map, Value};

use super::{
    DeserializationError, Deserializer, DeserializerContext, InvalidEdmValue, unexpected_item,
};
use crate::edm::{
    EdmModel, EdmPrimitiveKind, EdmStructuredValue, EdmType, EdmTypeKind, EdmTypeReference,
    EdmValue,
};
use crate::payload_kind::PayloadKind;
use crate::reader::{ODataItem, ODataResource, WireReader, json_kind};

const ROOT: &str = "$";

#[derive(Debug, Clone, Copy, Default)]
/// Read an entity or complex instance into an [`EdmValue::Structured`].
pub struct EdmResourceDeserializer;

#[derive(Debug, Clone, Copy, Default)]
/// Read a resource set into an [`EdmValue::Collection`] of structured values.
pub struct EdmResourceSetDeserializer;

#[derive(Debug, Clone, Copy, Default)]
/// Read a collection of primitive, enum or complex values into an [`EdmValue::Collection`].
pub struct EdmCollectionDeserializer;

#[derive(Debug, Clone, Copy, Default)]
/// Read a single primitive or enum value.
pub struct EdmPropertyDeserializer;

impl Deserializer for EdmResourceDeserializer {
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
        let declared = context.expected_type().and_then(EdmTypeReference::named_type);
        let value = resource_value(resource, declared, context.model(), ROOT)?;
        Ok(Box::new(value))
    }
}

impl Deserializer for EdmResourceSetDeserializer {
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
        let declared = context
            .expected_type()
            .map(|t| t.element_type().unwrap_or(t))
            .and_then(EdmTypeReference::named_type);
        let values = resources
            .into_iter()
            .enumerate()
            .map(|(i, resource)| {
                resource_value(resource, declared, context.model(), &format!("{ROOT}[{i}]"))
            })
            .collect::<Result<_, _>>()?;
        Ok(Box::new(EdmValue::Collection(values)))
    }
}

impl Deserializer for EdmCollectionDeserializer {
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
        let value = match context.expected_type() {
            Some(t) if t.kind() == EdmTypeKind::Collection => {
                edm_value(Value::Array(items), t, context.model(), ROOT)?
            }
            _ => infer(Value::Array(items)),
        };
        Ok(Box::new(value))
    }
}

impl Deserializer for EdmPropertyDeserializer {
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
        let value = match context.expected_type() {
            Some(t) => edm_value(value, t, context.model(), ROOT)?,
            None => infer(value),
        };
        Ok(Box::new(value))
    }
}

/// Convert a JSON value into an [`EdmValue`] of the given EDM type.
///
/// Properties that the model doesn't declare are kept, with their type inferred
/// from the JSON value.
pub(crate) fn edm_value(
    value: Value,
    type_ref: &EdmTypeReference,
    model: &EdmModel,
    location: &str,
) -> Result<EdmValue, InvalidEdmValue> {
    if value.is_null() {
        return if type_ref.is_nullable() {
            Ok(EdmValue::Null)
        } else {
            Err(invalid(location, format!("`{type_ref}` is not nullable")))
        };
    }
    match type_ref.definition() {
        EdmType::Untyped => Ok(infer(value)),
        EdmType::Primitive(kind) => primitive(value, *kind, location),
        EdmType::Enum(type_name) => enum_member(value, type_name, model, location),
        EdmType::Entity(type_name) | EdmType::Complex(type_name) => match value {
            Value::Object(object) => structured(object, Some(type_name.as_str()), model, location),
            other => Err(mismatch(location, type_ref, &other)),
        },
        EdmType::Collection(element) => match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| edm_value(item, element, model, &format!("{location}[{i}]")))
                .collect::<Result<_, _>>()
                .map(EdmValue::Collection),
            other => Err(mismatch(location, type_ref, &other)),
        },
    }
}

fn resource_value(
    resource: ODataResource,
    declared: Option<&str>,
    model: &EdmModel,
    location: &str,
) -> Result<EdmValue, InvalidEdmValue> {
    let type_name = resource.type_name.as_deref().or(declared);
    structured_properties(
        resource.properties,
        type_name.map(str::to_owned),
        model,
        location,
    )
}

fn structured(
    mut object: Map<String, Value>,
    declared: Option<&str>,
    model: &EdmModel,
    location: &str,
) -> Result<EdmValue, InvalidEdmValue> {
    let annotated = object
        .remove("@odata.type")
        .and_then(|t| t.as_str().map(|t| t.trim_start_matches('#').to_owned()));
    if let (Some(actual), Some(declared)) = (annotated.as_deref(), declared) {
        if !model.is_assignable(actual, declared) {
            return Err(invalid(
                location,
                format!("`{actual}` is not compatible with `{declared}`"),
            ));
        }
    }
    let type_name = annotated.or_else(|| declared.map(str::to_owned));
    structured_properties(object, type_name, model, location)
}

fn structured_properties(
    properties: Map<String, Value>,
    type_name: Option<String>,
    model: &EdmModel,
    location: &str,
) -> Result<EdmValue, InvalidEdmValue> {
    let mut value = EdmStructuredValue::new(type_name);
    for (name, property) in properties {
        // Instance and property annotations are control information, not data.
        if name.contains('@') {
            continue;
        }
        let declared = value
            .type_name()
            .and_then(|t| model.find_property(t, &name))
            .cloned();
        let property = match declared {
            Some(type_ref) => {
                edm_value(property, &type_ref, model, &format!("{location}.{name}"))?
            }
            None => infer(property),
        };
        value.insert(name, property);
    }
    Ok(EdmValue::Structured(value))
}

fn primitive(
    value: Value,
    kind: EdmPrimitiveKind,
    location: &str,
) -> Result<EdmValue, InvalidEdmValue> {
    let type_name = kind.qualified_name();
    if let Some((min, max)) = kind.integral_range() {
        let integer = match &value {
            Value::Number(n) => n.as_i64(),
            // `Edm.Int64` values may be serialized as strings (`IEEE754Compatible=true`).
            Value::String(s) if kind == EdmPrimitiveKind::Int64 => s.parse().ok(),
            _ => None,
        };
        return match integer {
            Some(i) if (min..=max).contains(&i) => Ok(EdmValue::Integer(i)),
            Some(i) => Err(invalid(
                location,
                format!("{i} is out of range for `{type_name}`"),
            )),
            None => Err(invalid(
                location,
                format!("expected a value of type `{type_name}`, found {}", json_kind(&value)),
            )),
        };
    }
    match (kind, value) {
        (EdmPrimitiveKind::Boolean, Value::Bool(b)) => Ok(EdmValue::Boolean(b)),
        (EdmPrimitiveKind::Double | EdmPrimitiveKind::Single, Value::Number(n)) => n
            .as_f64()
            .map(EdmValue::Float)
            .ok_or_else(|| invalid(location, format!("{n} is not a valid `{type_name}`"))),
        (EdmPrimitiveKind::Double | EdmPrimitiveKind::Single, Value::String(s)) => {
            match s.as_str() {
                "NaN" => Ok(EdmValue::Float(f64::NAN)),
                "INF" => Ok(EdmValue::Float(f64::INFINITY)),
                "-INF" => Ok(EdmValue::Float(f64::NEG_INFINITY)),
                _ => Err(invalid(
                    location,
                    format!("`{s}` is not a valid `{type_name}`"),
                )),
            }
        }
        (EdmPrimitiveKind::Decimal, Value::Number(n)) => Ok(EdmValue::Decimal(n.to_string())),
        (EdmPrimitiveKind::Decimal, Value::String(s)) => match s.parse::<f64>() {
            Ok(_) => Ok(EdmValue::Decimal(s)),
            Err(_) => Err(invalid(
                location,
                format!("`{s}` is not a valid `{type_name}`"),
            )),
        },
        (
            EdmPrimitiveKind::Binary
            | EdmPrimitiveKind::Date
            | EdmPrimitiveKind::DateTimeOffset
            | EdmPrimitiveKind::Duration
            | EdmPrimitiveKind::Guid
            | EdmPrimitiveKind::String
            | EdmPrimitiveKind::TimeOfDay,
            Value::String(s),
        ) => Ok(EdmValue::String(s)),
        (_, other) => Err(invalid(
            location,
            format!("expected a value of type `{type_name}`, found {}", json_kind(&other)),
        )),
    }
}

fn enum_member(
    value: Value,
    type_name: &str,
    model: &EdmModel,
    location: &str,
) -> Result<EdmValue, InvalidEdmValue> {
    let Value::String(member) = value else {
        return Err(invalid(
            location,
            format!("expected a member of `{type_name}`, found {}", json_kind(&value)),
        ));
    };
    if let Some(enum_type) = model.find_enum_type(type_name) {
        if enum_type.member_value(&member).is_none() {
            return Err(invalid(
                location,
                format!("`{member}` is not a member of `{type_name}`"),
            ));
        }
    }
    Ok(EdmValue::Enum {
        type_name: type_name.to_owned(),
        member,
    })
}

/// Build an [`EdmValue`] out of a JSON value with no type information.
pub(crate) fn infer(value: Value) -> EdmValue {
    match value {
        Value::Null => EdmValue::Null,
        Value::Bool(b) => EdmValue::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => EdmValue::Integer(i),
            None => EdmValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => EdmValue::String(s),
        Value::Array(items) => EdmValue::Collection(items.into_iter().map(infer).collect()),
        Value::Object(mut object) => {
            let type_name = object
                .remove("@odata.type")
                .and_then(|t| t.as_str().map(|t| t.trim_start_matches('#').to_owned()));
            let mut structured = EdmStructuredValue::new(type_name);
            for (name, property) in object {
                if !name.contains('@') {
                    structured.insert(name, infer(property));
                }
            }
            EdmValue::Structured(structured)
        }
    }
}

fn invalid(location: &str, reason: String) -> InvalidEdmValue {
    InvalidEdmValue {
        location: location.to_owned(),
        reason,
    }
}

fn mismatch(location: &str, type_ref: &EdmTypeReference, found: &Value) -> InvalidEdmValue {
    invalid(
        location,
        format!("expected a value of type `{type_ref}`, found {}", json_kind(found)),
    )
}
