//! The resolved OData path of a request.
use smallvec::SmallVec;

use crate::edm::{EdmPrimitiveKind, EdmTypeReference};

/// One segment of a resolved OData path.
///
/// Routing resolves the URL into segments ahead of body deserialization;
/// each segment carries the EDM type it addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `/Customers`: the collection of entities exposed by an entity set.
    EntitySet { name: String, entity_type: String },
    /// `/Me`: a single entity exposed directly by the service.
    Singleton { name: String, entity_type: String },
    /// `(1)`: a single entity, picked by key out of the previous collection.
    Key { entity_type: String },
    /// `/Orders`: a navigation property, either single- or collection-valued.
    Navigation { name: String, target: EdmTypeReference },
    /// `/Name`: a structural property.
    Property { name: String, type_ref: EdmTypeReference },
    /// `/$value`: the raw value of the previous primitive property.
    Value { type_ref: EdmTypeReference },
    /// `/$ref`: a reference to the entity (or entities) addressed so far.
    Ref,
    /// `/$count`
    Count,
    /// `/Sales.Rate`: the invocation of an action.
    Action { name: String },
}

impl PathSegment {
    /// The EDM type of the resource this segment addresses.
    ///
    /// Action invocations and `$ref` segments do not address a typed resource.
    pub fn edm_type(&self) -> Option<EdmTypeReference> {
        match self {
            PathSegment::EntitySet { entity_type, .. } => Some(EdmTypeReference::collection(
                EdmTypeReference::entity(entity_type.clone()).with_nullable(false),
            )),
            PathSegment::Singleton { entity_type, .. } | PathSegment::Key { entity_type } => {
                Some(EdmTypeReference::entity(entity_type.clone()))
            }
            PathSegment::Navigation { target, .. } => Some(target.clone()),
            PathSegment::Property { type_ref, .. } | PathSegment::Value { type_ref } => {
                Some(type_ref.clone())
            }
            PathSegment::Count => Some(
                EdmTypeReference::primitive(EdmPrimitiveKind::Int32).with_nullable(false),
            ),
            PathSegment::Ref | PathSegment::Action { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// The OData path an incoming request was routed to.
pub struct ODataPath {
    segments: SmallVec<[PathSegment; 4]>,
}

impl ODataPath {
    pub fn new(segments: impl IntoIterator<Item = PathSegment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    pub fn push(mut self, segment: PathSegment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// The EDM type targeted by the path, i.e. the type of its last segment.
    pub fn edm_type(&self) -> Option<EdmTypeReference> {
        self.last_segment().and_then(PathSegment::edm_type)
    }

    /// The name of the action invoked by this path, if it ends with an action segment.
    pub fn action_name(&self) -> Option<&str> {
        match self.last_segment()? {
            PathSegment::Action { name } => Some(name),
            _ => None,
        }
    }
}

impl FromIterator<PathSegment> for ODataPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edm::EdmTypeKind;

    #[test]
    fn entity_set_targets_a_collection_of_entities() {
        let path = ODataPath::new([PathSegment::EntitySet {
            name: "Customers".into(),
            entity_type: "Sales.Customer".into(),
        }]);
        let t = path.edm_type().unwrap();
        assert_eq!(t.kind(), EdmTypeKind::Collection);
        assert_eq!(t.to_string(), "Collection(Sales.Customer)");
    }

    #[test]
    fn action_paths_have_no_target_type() {
        let path = ODataPath::new([
            PathSegment::EntitySet {
                name: "Customers".into(),
                entity_type: "Sales.Customer".into(),
            },
            PathSegment::Key {
                entity_type: "Sales.Customer".into(),
            },
            PathSegment::Action {
                name: "Sales.Rate".into(),
            },
        ]);
        assert_eq!(path.edm_type(), None);
        assert_eq!(path.action_name(), Some("Sales.Rate"));
    }

    #[test]
    fn empty_path_has_no_target_type() {
        assert_eq!(ODataPath::default().edm_type(), None);
        assert_eq!(ODataPath::default().action_name(), None);
    }
}
