//! Classification of the wire shape of an OData message body.
use std::collections::BTreeSet;
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
/// The shape of an OData payload.
pub enum PayloadKind {
    /// A single entity or complex instance.
    Resource,
    /// A collection of entities.
    ResourceSet,
    /// A single primitive or enum value.
    Property,
    /// A collection of primitive, enum or complex values.
    Collection,
    /// A reference (`@odata.id`) to an entity.
    EntityReferenceLink,
    /// The named arguments of an action invocation.
    ActionParameters,
    /// No payload at all.
    None,
    /// An OData error document.
    Error,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Resource => "resource",
            PayloadKind::ResourceSet => "resource_set",
            PayloadKind::Property => "property",
            PayloadKind::Collection => "collection",
            PayloadKind::EntityReferenceLink => "entity_reference_link",
            PayloadKind::ActionParameters => "action_parameters",
            PayloadKind::None => "none",
            PayloadKind::Error => "error",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
/// The set of payload kinds a formatter is willing to read.
pub struct PayloadKinds(BTreeSet<PayloadKind>);

impl PayloadKinds {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, kind: PayloadKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn insert(&mut self, kind: PayloadKind) -> bool {
        self.0.insert(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = PayloadKind> + '_ {
        self.0.iter().copied()
    }
}

impl Default for PayloadKinds {
    /// Every kind that can appear in a request body.
    fn default() -> Self {
        [
            PayloadKind::Resource,
            PayloadKind::ResourceSet,
            PayloadKind::Property,
            PayloadKind::Collection,
            PayloadKind::EntityReferenceLink,
            PayloadKind::ActionParameters,
        ]
        .into_iter()
        .collect()
    }
}

impl FromIterator<PayloadKind> for PayloadKinds {
    fn from_iter<I: IntoIterator<Item = PayloadKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_excludes_non_body_kinds() {
        let kinds = PayloadKinds::default();
        assert!(kinds.contains(PayloadKind::Resource));
        assert!(kinds.contains(PayloadKind::ActionParameters));
        assert!(!kinds.contains(PayloadKind::None));
        assert!(!kinds.contains(PayloadKind::Error));
    }

    #[test]
    fn kinds_deserialize_from_snake_case() {
        let kinds: PayloadKinds =
            serde_json::from_str(r#"["resource", "entity_reference_link"]"#).unwrap();
        assert_eq!(
            kinds.iter().collect::<Vec<_>>(),
            vec![PayloadKind::Resource, PayloadKind::EntityReferenceLink]
        );
    }
}
