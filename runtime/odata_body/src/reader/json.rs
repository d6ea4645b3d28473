use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Uri};
use serde_json::{Map, Value};

use super::{
    ODataItem, ODataResource, ReaderFactory, ReaderSettings, ValidationKinds, WireError,
    WireReader, json_kind,
};
use crate::deserializer::DeserializerContext;
use crate::edm::{EdmModel, EdmTypeReference};
use crate::payload_kind::PayloadKind;
use crate::version::ODataVersion;

#[derive(Debug, Clone, Copy, Default)]
/// Opens [`JsonWireReader`]s for `application/json` payloads.
pub struct JsonReaderFactory;

impl ReaderFactory for JsonReaderFactory {
    fn open(
        &self,
        body: Bytes,
        headers: &HeaderMap,
        settings: ReaderSettings,
        model: Arc<EdmModel>,
    ) -> Result<Box<dyn WireReader>, WireError> {
        check_json_content_type(headers)?;
        Ok(Box::new(JsonWireReader::new(body, settings, model)))
    }
}

#[derive(Debug)]
/// Reads a payload in the OData JSON format.
///
/// The whole document is parsed on the first call to [`WireReader::read`];
/// a reader can only be read once.
pub struct JsonWireReader {
    body: Option<Bytes>,
    settings: ReaderSettings,
    model: Arc<EdmModel>,
    released: bool,
}

impl JsonWireReader {
    pub fn new(body: Bytes, settings: ReaderSettings, model: Arc<EdmModel>) -> Self {
        Self {
            body: Some(body),
            settings,
            model,
            released: false,
        }
    }

    /// `true` once [`WireReader::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Map an instance annotation key to its control-information term,
    /// e.g. `@odata.type` to `type`.
    ///
    /// OData 4.01 payloads may omit the `odata.` prefix.
    fn control_term<'k>(&self, key: &'k str) -> Option<&'k str> {
        let annotation = key.strip_prefix('@')?;
        match annotation.strip_prefix("odata.") {
            Some(term) => Some(term),
            None if self.settings.version >= ODataVersion::V401 && !annotation.contains('.') => {
                Some(annotation)
            }
            None => None,
        }
    }

    /// Read one resource out of a payload of the given `kind`.
    fn read_resource(
        &self,
        document: Value,
        expected: Option<&EdmTypeReference>,
        kind: PayloadKind,
    ) -> Result<ODataResource, WireError> {
        let found = json_kind(&document);
        let Value::Object(object) = document else {
            return Err(WireError::UnexpectedShape {
                expected: PayloadKind::Resource,
                found,
            });
        };
        let mut resource = ODataResource::default();
        for (key, value) in object {
            if let Some(term) = self.control_term(&key) {
                match term {
                    "type" => resource.type_name = Some(type_annotation(&key, &value, kind)?),
                    "id" => {
                        let link = string_annotation(&key, &value, kind)?;
                        resource.id = Some(self.resolve_link(link)?);
                    }
                    _ => {}
                }
                continue;
            }
            // Property annotations, e.g. `Photo@odata.mediaEditLink`.
            if key.contains('@') {
                continue;
            }
            resource.properties.insert(key, value);
        }
        self.validate_resource(&resource, expected)?;
        Ok(resource)
    }

    fn validate_resource(
        &self,
        resource: &ODataResource,
        expected: Option<&EdmTypeReference>,
    ) -> Result<(), WireError> {
        let expected_name = expected.and_then(EdmTypeReference::named_type);
        let validations = self.settings.validations;

        if let (Some(actual), Some(expected)) = (resource.type_name.as_deref(), expected_name) {
            if validations.contains(ValidationKinds::THROW_IF_TYPE_CONFLICTS_WITH_METADATA)
                && !self.model.is_assignable(actual, expected)
            {
                return Err(WireError::TypeConflict {
                    expected: expected.to_owned(),
                    actual: actual.to_owned(),
                });
            }
        }

        if !validations.contains(ValidationKinds::THROW_ON_UNDECLARED_PROPERTY) {
            return Ok(());
        }
        let Some(type_name) = resource.type_name.as_deref().or(expected_name) else {
            return Ok(());
        };
        if self.model.find_structured_type(type_name).is_none() || self.model.is_open(type_name) {
            return Ok(());
        }
        match resource
            .properties
            .keys()
            .find(|p| self.model.find_property(type_name, p).is_none())
        {
            Some(property) => Err(WireError::UndeclaredProperty {
                type_name: type_name.to_owned(),
                property: property.to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Unwrap the `{"value": ...}` envelope used by property and collection payloads.
    fn unwrap_value(&self, document: Value, kind: PayloadKind) -> Result<Value, WireError> {
        let found = json_kind(&document);
        let Value::Object(object) = document else {
            return Err(WireError::UnexpectedShape {
                expected: kind,
                found,
            });
        };
        object
            .into_iter()
            .find_map(|(key, value)| (key == "value").then_some(value))
            .ok_or(WireError::UnexpectedShape {
                expected: kind,
                found: "an object without a `value` member",
            })
    }

    fn unwrap_array(&self, document: Value, kind: PayloadKind) -> Result<Vec<Value>, WireError> {
        match self.unwrap_value(document, kind)? {
            Value::Array(items) => Ok(items),
            other => Err(WireError::UnexpectedShape {
                expected: kind,
                found: json_kind(&other),
            }),
        }
    }

    fn read_reference_link(&self, document: Value) -> Result<Uri, WireError> {
        let found = json_kind(&document);
        let Value::Object(object) = document else {
            return Err(WireError::UnexpectedShape {
                expected: PayloadKind::EntityReferenceLink,
                found,
            });
        };
        let (key, link) = object
            .iter()
            .find(|(key, _)| self.control_term(key) == Some("id"))
            .ok_or(WireError::UnexpectedShape {
                expected: PayloadKind::EntityReferenceLink,
                found: "an object without an `@odata.id` member",
            })?;
        self.resolve_link(string_annotation(key, link, PayloadKind::EntityReferenceLink)?)
    }

    fn read_parameters(
        &self,
        document: Value,
        context: &DeserializerContext<'_>,
    ) -> Result<Map<String, Value>, WireError> {
        let found = json_kind(&document);
        let Value::Object(object) = document else {
            return Err(WireError::UnexpectedShape {
                expected: PayloadKind::ActionParameters,
                found,
            });
        };
        let action = context
            .path()
            .action_name()
            .and_then(|name| self.model.find_action(name));
        let mut parameters = Map::new();
        for (name, value) in object {
            if name.contains('@') {
                continue;
            }
            if let Some(action) = action {
                if action.parameter_type(&name).is_none() {
                    return Err(WireError::UndeclaredParameter {
                        action: action.name().to_owned(),
                        parameter: name,
                    });
                }
            }
            parameters.insert(name, value);
        }
        Ok(parameters)
    }

    /// Resolve a (possibly relative) link against the base URI.
    fn resolve_link(&self, link: &str) -> Result<Uri, WireError> {
        let invalid = || WireError::InvalidLink {
            link: link.to_owned(),
        };
        if let Ok(uri) = link.parse::<Uri>() {
            if uri.scheme().is_some() {
                return Ok(uri);
            }
        }
        let Some(base) = &self.settings.base_uri else {
            return link.parse().map_err(|_| invalid());
        };
        let resolved = match (link.strip_prefix('/'), base.scheme_str(), base.authority()) {
            (Some(absolute_path), Some(scheme), Some(authority)) => {
                format!("{scheme}://{authority}/{absolute_path}")
            }
            _ => {
                let base = base.to_string();
                let separator = if base.ends_with('/') { "" } else { "/" };
                format!("{base}{separator}{link}")
            }
        };
        resolved.parse().map_err(|_| invalid())
    }
}

impl WireReader for JsonWireReader {
    fn read(
        &mut self,
        kind: PayloadKind,
        context: &DeserializerContext<'_>,
    ) -> Result<ODataItem, WireError> {
        if self.released {
            return Err(WireError::Released);
        }
        let body = self.body.take().ok_or(WireError::AlreadyConsumed)?;
        let document: Value = serde_json::from_slice(&body).map_err(WireError::MalformedPayload)?;
        let expected = context.expected_type();

        let item = match kind {
            PayloadKind::Resource => {
                ODataItem::Resource(self.read_resource(document, expected, kind)?)
            }
            PayloadKind::ResourceSet => {
                let element = expected.map(|t| t.element_type().unwrap_or(t));
                let resources = self
                    .unwrap_array(document, kind)?
                    .into_iter()
                    .map(|item| self.read_resource(item, element, kind))
                    .collect::<Result<_, _>>()?;
                ODataItem::ResourceSet(resources)
            }
            PayloadKind::Property => ODataItem::Property(self.unwrap_value(document, kind)?),
            PayloadKind::Collection => ODataItem::Collection(self.unwrap_array(document, kind)?),
            PayloadKind::EntityReferenceLink => {
                ODataItem::EntityReferenceLink(self.read_reference_link(document)?)
            }
            PayloadKind::ActionParameters => {
                ODataItem::Parameters(self.read_parameters(document, context)?)
            }
            PayloadKind::None | PayloadKind::Error => {
                return Err(WireError::UnsupportedPayloadKind { kind });
            }
        };
        Ok(item)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.body = None;
            tracing::trace!("Released OData JSON reader");
        }
    }
}

fn type_annotation(key: &str, value: &Value, kind: PayloadKind) -> Result<String, WireError> {
    string_annotation(key, value, kind).map(|name| name.trim_start_matches('#').to_owned())
}

/// The string value of a control annotation found in a payload of the given `kind`.
fn string_annotation<'v>(
    key: &str,
    value: &'v Value,
    kind: PayloadKind,
) -> Result<&'v str, WireError> {
    value.as_str().ok_or_else(|| WireError::InvalidAnnotation {
        annotation: key.to_owned(),
        kind,
        found: json_kind(value),
    })
}

/// Check that the `Content-Type` header is set to `application/json`, or another
/// `application/*+json` MIME type.
///
/// Return an error otherwise.
fn check_json_content_type(headers: &HeaderMap) -> Result<(), WireError> {
    let Some(content_type) = headers.get(http::header::CONTENT_TYPE) else {
        return Err(WireError::MissingContentType);
    };
    let Ok(content_type) = content_type.to_str() else {
        return Err(WireError::MissingContentType);
    };

    let Ok(mime) = content_type.parse::<mime::Mime>() else {
        return Err(WireError::ContentTypeMismatch {
            actual: content_type.to_string(),
        });
    };

    let is_json_content_type = mime.type_() == "application"
        && (mime.subtype() == "json" || mime.suffix().is_some_and(|name| name == "json"));
    if !is_json_content_type {
        return Err(WireError::ContentTypeMismatch {
            actual: content_type.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use http::HeaderMap;

    use super::*;
    use crate::deserializer::{DeserializerContext, NativeType};
    use crate::edm::{EdmAction, EdmPrimitiveKind, EdmStructuredType};
    use crate::path::{ODataPath, PathSegment};
    use crate::request::RequestHead;

    fn model() -> Arc<EdmModel> {
        let mut model = EdmModel::new();
        model
            .add_structured_type(
                EdmStructuredType::entity("Sales.Customer")
                    .key("Id")
                    .property("Id", EdmTypeReference::primitive(EdmPrimitiveKind::Int32))
                    .property("Name", EdmTypeReference::primitive(EdmPrimitiveKind::String)),
            )
            .add_structured_type(
                EdmStructuredType::entity("Sales.VipCustomer").derives_from("Sales.Customer"),
            )
            .add_structured_type(EdmStructuredType::entity("Sales.Order").key("Id"))
            .add_action(
                EdmAction::new("Sales.Rate")
                    .parameter("stars", EdmTypeReference::primitive(EdmPrimitiveKind::Int32)),
            );
        Arc::new(model)
    }

    fn head() -> RequestHead {
        RequestHead {
            method: http::Method::POST,
            target: "/odata/Customers".parse().unwrap(),
            version: http::Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    fn read(
        body: &str,
        kind: PayloadKind,
        path: &ODataPath,
        settings: ReaderSettings,
    ) -> Result<ODataItem, WireError> {
        let model = model();
        let head = head();
        let context = DeserializerContext::new(
            path,
            &model,
            path.edm_type().map(|t| t.element_type().cloned().unwrap_or(t)),
            NativeType::of::<()>(),
            &head,
        );
        let mut reader =
            JsonWireReader::new(Bytes::copy_from_slice(body.as_bytes()), settings, model.clone());
        reader.read(kind, &context)
    }

    fn customers() -> ODataPath {
        ODataPath::new([PathSegment::EntitySet {
            name: "Customers".into(),
            entity_type: "Sales.Customer".into(),
        }])
    }

    fn strict() -> ReaderSettings {
        ReaderSettings::default()
    }

    fn lenient() -> ReaderSettings {
        ReaderSettings {
            validations: ValidationKinds::all() - ValidationKinds::THROW_ON_UNDECLARED_PROPERTY,
            ..ReaderSettings::default()
        }
    }

    #[test]
    fn resources_drop_control_information() {
        let item = read(
            r##"{"@odata.context": "$metadata#Customers/$entity", "@odata.type": "#Sales.VipCustomer", "Id": 1, "Name@odata.type": "String", "Name": "Alice"}"##,
            PayloadKind::Resource,
            &customers(),
            strict(),
        )
        .unwrap();
        let ODataItem::Resource(resource) = item else {
            panic!("Expected a resource, got {item:?}");
        };
        assert_eq!(resource.type_name.as_deref(), Some("Sales.VipCustomer"));
        assert_eq!(
            resource.properties.keys().collect::<Vec<_>>(),
            vec!["Id", "Name"]
        );
    }

    #[test]
    fn undeclared_properties_are_rejected_only_when_asked_to() {
        let body = r#"{"Id": 1, "Nickname": "Al"}"#;
        let err = read(body, PayloadKind::Resource, &customers(), strict()).unwrap_err();
        insta::assert_snapshot!(err, @"`Nickname` is not a declared property of `Sales.Customer`, which is not an open type");

        let item = read(body, PayloadKind::Resource, &customers(), lenient()).unwrap();
        assert_eq!(item.kind(), PayloadKind::Resource);
    }

    #[test]
    fn type_annotations_must_derive_from_the_expected_type() {
        let err = read(
            r##"{"@odata.type": "#Sales.Order", "Id": 1}"##,
            PayloadKind::Resource,
            &customers(),
            lenient(),
        )
        .unwrap_err();
        insta::assert_snapshot!(err, @"The payload declares its type as `Sales.Order`, which is not compatible with `Sales.Customer`");
    }

    #[test]
    fn short_annotations_require_401() {
        let body = r##"{"@type": "#Sales.Order", "Id": 1}"##;
        // In 4.0, `@type` is a custom annotation and is ignored.
        assert!(read(body, PayloadKind::Resource, &customers(), lenient()).is_ok());

        let settings = ReaderSettings {
            version: ODataVersion::V401,
            ..lenient()
        };
        assert!(matches!(
            read(body, PayloadKind::Resource, &customers(), settings),
            Err(WireError::TypeConflict { .. })
        ));
    }

    #[test]
    fn collections_use_the_value_envelope() {
        let item = read(
            r#"{"value": [1, 2, 3]}"#,
            PayloadKind::Collection,
            &customers(),
            strict(),
        )
        .unwrap();
        assert_eq!(
            item,
            ODataItem::Collection(vec![1.into(), 2.into(), 3.into()])
        );

        let err = read("[1, 2, 3]", PayloadKind::Collection, &customers(), strict()).unwrap_err();
        insta::assert_snapshot!(err, @"Expected a collection payload, but the document is an array");
    }

    #[test]
    fn invalid_annotations_name_the_payload_being_read() {
        let err = read(
            r#"{"@odata.id": 42, "Id": 1}"#,
            PayloadKind::Resource,
            &customers(),
            lenient(),
        )
        .unwrap_err();
        insta::assert_snapshot!(err, @"The `@odata.id` annotation in a resource payload must be a string, found a number");

        let err = read(
            r#"{"value": [{"@odata.type": false, "Id": 1}]}"#,
            PayloadKind::ResourceSet,
            &customers(),
            lenient(),
        )
        .unwrap_err();
        insta::assert_snapshot!(err, @"The `@odata.type` annotation in a resource_set payload must be a string, found a boolean");
    }

    #[test]
    fn relative_reference_links_are_resolved_against_the_base_uri() {
        let settings = ReaderSettings {
            base_uri: Some("https://example.com/odata/".parse().unwrap()),
            ..strict()
        };
        let item = read(
            r#"{"@odata.id": "Customers(1)"}"#,
            PayloadKind::EntityReferenceLink,
            &ODataPath::new([PathSegment::Ref]),
            settings.clone(),
        )
        .unwrap();
        assert_eq!(
            item,
            ODataItem::EntityReferenceLink(
                "https://example.com/odata/Customers(1)".parse().unwrap()
            )
        );

        let item = read(
            r#"{"@odata.id": "/other/Customers(1)"}"#,
            PayloadKind::EntityReferenceLink,
            &ODataPath::new([PathSegment::Ref]),
            settings,
        )
        .unwrap();
        assert_eq!(
            item,
            ODataItem::EntityReferenceLink("https://example.com/other/Customers(1)".parse().unwrap())
        );
    }

    #[test]
    fn undeclared_action_parameters_are_rejected() {
        let path = customers()
            .push(PathSegment::Key {
                entity_type: "Sales.Customer".into(),
            })
            .push(PathSegment::Action {
                name: "Sales.Rate".into(),
            });
        let err = read(
            r#"{"stars": 5, "comment": "great"}"#,
            PayloadKind::ActionParameters,
            &path,
            strict(),
        )
        .unwrap_err();
        insta::assert_snapshot!(err, @"`comment` is not a parameter of the `Sales.Rate` action");
    }

    #[test]
    fn readers_can_only_be_read_once_and_not_after_release() {
        let model = model();
        let head = head();
        let path = customers();
        let context = DeserializerContext::new(&path, &model, None, NativeType::of::<()>(), &head);
        let mut reader =
            JsonWireReader::new(Bytes::from_static(b"{}"), ReaderSettings::default(), model.clone());
        assert!(reader.read(PayloadKind::Resource, &context).is_ok());
        assert!(matches!(
            reader.read(PayloadKind::Resource, &context),
            Err(WireError::AlreadyConsumed)
        ));
        reader.release();
        reader.release();
        assert!(reader.is_released());
        assert!(matches!(
            reader.read(PayloadKind::Resource, &context),
            Err(WireError::Released)
        ));
    }

    #[test]
    fn missing_content_type() {
        let err = check_json_content_type(&HeaderMap::new()).unwrap_err();
        insta::assert_snapshot!(err, @"The `Content-Type` header is missing. OData endpoints expect requests with a `Content-Type` header set to `application/json`, or another `application/*+json` MIME type");
    }

    #[test]
    fn content_type_is_not_json() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            "application/xml".parse().unwrap(),
        );
        let err = check_json_content_type(&headers).unwrap_err();
        insta::assert_snapshot!(err, @"The `Content-Type` header was set to `application/xml`. OData endpoints expect requests with a `Content-Type` header set to `application/json`, or another `application/*+json` MIME type");
    }

    #[test]
    fn odata_format_parameters_are_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            "application/json;odata.metadata=minimal;charset=utf-8"
                .parse()
                .unwrap(),
        );
        assert!(check_json_content_type(&headers).is_ok());
    }
}
