use indexmap::IndexMap;

/// A value read from a payload without a Rust type to bind it to.
///
/// This is what typeless deserialization produces: the shape of the value
/// follows the EDM type the request path resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum EdmValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    /// `Edm.Decimal` values are kept in their textual representation
    /// to avoid losing precision.
    Decimal(String),
    /// Strings and every primitive serialized as a JSON string
    /// (`Edm.Guid`, `Edm.Date`, `Edm.Duration`, ...).
    String(String),
    Enum {
        type_name: String,
        member: String,
    },
    Structured(EdmStructuredValue),
    Collection(Vec<EdmValue>),
}

impl EdmValue {
    pub fn is_null(&self) -> bool {
        matches!(self, EdmValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EdmValue::String(s) | EdmValue::Decimal(s) => Some(s),
            EdmValue::Enum { member, .. } => Some(member),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EdmValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EdmValue::Float(f) => Some(*f),
            EdmValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EdmValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&EdmStructuredValue> {
        match self {
            EdmValue::Structured(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[EdmValue]> {
        match self {
            EdmValue::Collection(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for EdmValue {
    fn from(value: &str) -> Self {
        EdmValue::String(value.to_owned())
    }
}

impl From<i64> for EdmValue {
    fn from(value: i64) -> Self {
        EdmValue::Integer(value)
    }
}

impl From<bool> for EdmValue {
    fn from(value: bool) -> Self {
        EdmValue::Boolean(value)
    }
}

/// An instance of an entity or complex type.
///
/// Properties are kept in the order they appeared in the payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdmStructuredValue {
    type_name: Option<String>,
    properties: IndexMap<String, EdmValue>,
}

impl EdmStructuredValue {
    pub fn new(type_name: Option<String>) -> Self {
        Self {
            type_name,
            properties: IndexMap::new(),
        }
    }

    /// The qualified name of the instance's type.
    ///
    /// `None` when the value was read without type information.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn get(&self, property: &str) -> Option<&EdmValue> {
        self.properties.get(property)
    }

    pub fn insert(&mut self, property: String, value: EdmValue) {
        self.properties.insert(property, value);
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &EdmValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
