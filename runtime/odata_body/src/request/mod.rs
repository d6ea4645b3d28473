//! The incoming request, as seen by the deserialization layer.
//!
//! [`ODataRequest`] bundles what routing has already figured out about the
//! request (its [`ODataPath`], the [`EdmModel`] it targets, the [`RouteContext`]
//! used for link generation) together with the raw HTTP request and a set of
//! request-scoped [`RequestFeatures`].
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use indexmap::IndexMap;

pub use body::{BodySizeLimit, BufferedBody};
pub use request_head::RequestHead;

use crate::action::ActionParameters;
use crate::edm::EdmModel;
use crate::path::ODataPath;

mod body;
mod request_head;

/// A type-erased error, as produced by the request body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The body of an incoming request, boxed to erase the transport's body type.
pub type RequestBody = BoxBody<Bytes, BoxError>;

/// An incoming request routed to an OData endpoint.
///
/// # Ownership
///
/// An `ODataRequest` belongs to a single request-processing unit.
/// Deserialization borrows it mutably: the body can only be consumed once and
/// request-scoped state is written in place, without locking.
#[derive(Debug)]
pub struct ODataRequest {
    head: RequestHead,
    body: Option<RequestBody>,
    path: Option<ODataPath>,
    model: Option<Arc<EdmModel>>,
    route: RouteContext,
    features: RequestFeatures,
}

impl ODataRequest {
    /// Wrap an HTTP request.
    ///
    /// The [`RouteContext`] is pre-populated from the request target and its `Host` header.
    pub fn new<B>(request: http::Request<B>) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let head = RequestHead::from(parts);
        let route = RouteContext::from_head(&head);
        Self {
            head,
            body: Some(body.map_err(|e| -> BoxError { e.into() }).boxed()),
            path: None,
            model: None,
            route,
            features: RequestFeatures::default(),
        }
    }

    /// Attach the OData path this request was routed to.
    pub fn with_path(mut self, path: ODataPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Attach the EDM model the endpoint serves.
    pub fn with_model(mut self, model: Arc<EdmModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_route(mut self, route: RouteContext) -> Self {
        self.route = route;
        self
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// The resolved OData path.
    ///
    /// `None` if the request was not routed through an OData endpoint.
    pub fn path(&self) -> Option<&ODataPath> {
        self.path.as_ref()
    }

    pub fn model(&self) -> Option<&Arc<EdmModel>> {
        self.model.as_ref()
    }

    pub fn route(&self) -> &RouteContext {
        &self.route
    }

    pub fn route_mut(&mut self) -> &mut RouteContext {
        &mut self.route
    }

    pub fn features(&self) -> &RequestFeatures {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut RequestFeatures {
        &mut self.features
    }

    /// Take ownership of the body. Subsequent calls return `None`.
    pub(crate) fn take_body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }
}

#[derive(Debug, Clone, Default)]
/// What the host's router knows about the endpoint serving the request.
///
/// It's the input of link generation when computing the service root
/// (see [`BaseAddressResolver`](crate::base_address::BaseAddressResolver)).
pub struct RouteContext {
    /// The name of the endpoint the request was routed to, if it has one.
    pub endpoint_name: Option<String>,
    /// The values captured by the route template, e.g. `tenant => "acme"`.
    pub route_values: IndexMap<String, String>,
    pub scheme: String,
    pub host: String,
    /// The prefix under which the whole application is mounted, e.g. `/api`.
    pub path_base: String,
}

impl RouteContext {
    /// Derive scheme and host from the request target, falling back to
    /// `http` and the `Host` header for origin-form targets.
    pub fn from_head(head: &RequestHead) -> Self {
        let scheme = head.target.scheme_str().unwrap_or("http").to_owned();
        let host = head
            .target
            .authority()
            .map(|a| a.as_str().to_owned())
            .or_else(|| {
                head.headers
                    .get(http::header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_owned)
            })
            .unwrap_or_default();
        Self {
            endpoint_name: None,
            route_values: IndexMap::new(),
            scheme,
            host,
            path_base: String::new(),
        }
    }

    pub fn endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = Some(name.into());
        self
    }

    pub fn route_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_values.insert(key.into(), value.into());
        self
    }

    pub fn path_base(mut self, path_base: impl Into<String>) -> Self {
        self.path_base = path_base.into();
        self
    }
}

#[derive(Debug, Default)]
/// State attached to a single request while it is being processed.
pub struct RequestFeatures {
    action_parameters: Option<ActionParameters>,
}

impl RequestFeatures {
    /// The action parameters read from the body, if they have been read already.
    pub fn action_parameters(&self) -> Option<&ActionParameters> {
        self.action_parameters.as_ref()
    }

    /// Store the action parameters read from the body.
    ///
    /// The first write wins: later calls leave the cached map untouched.
    pub(crate) fn cache_action_parameters(
        &mut self,
        parameters: ActionParameters,
    ) -> &ActionParameters {
        self.action_parameters.get_or_insert(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    #[test]
    fn route_context_uses_host_header_for_origin_form_targets() {
        let request = http::Request::builder()
            .uri("/odata/Customers")
            .header(http::header::HOST, "example.com:8080")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let request = ODataRequest::new(request);
        assert_eq!(request.route().scheme, "http");
        assert_eq!(request.route().host, "example.com:8080");
    }

    #[test]
    fn route_context_prefers_absolute_targets() {
        let request = http::Request::builder()
            .uri("https://api.example.com/odata/Customers")
            .header(http::header::HOST, "ignored.example.com")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let request = ODataRequest::new(request);
        assert_eq!(request.route().scheme, "https");
        assert_eq!(request.route().host, "api.example.com");
    }

    #[test]
    fn body_can_only_be_taken_once() {
        let request = http::Request::new(Full::new(Bytes::from_static(b"{}")));
        let mut request = ODataRequest::new(request);
        assert!(request.take_body().is_some());
        assert!(request.take_body().is_none());
    }
}
