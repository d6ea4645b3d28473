//! The service root relative links in a payload are resolved against.
use std::sync::Arc;

use http::Uri;
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::request::{ODataRequest, RouteContext};

/// Characters that must be escaped inside a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The host's ability to build the URL of a named endpoint.
pub trait LinkGenerator: Send + Sync {
    /// The absolute URL of `endpoint_name`, or `None` if it can't be built
    /// (unknown endpoint, missing route values, ...).
    fn uri_by_name(
        &self,
        endpoint_name: &str,
        route_values: &IndexMap<String, String>,
        scheme: &str,
        host: &str,
        path_base: &str,
    ) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
/// A [`LinkGenerator`] backed by a table of route templates, e.g. `/odata/{tenant}`.
pub struct RouteTemplateLinkGenerator {
    templates: IndexMap<String, String>,
}

impl RouteTemplateLinkGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the template of a named endpoint.
    pub fn route(mut self, endpoint_name: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(endpoint_name.into(), template.into());
        self
    }

    fn expand(template: &str, route_values: &IndexMap<String, String>) -> Option<String> {
        let mut path = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            let end = start + rest[start..].find('}')?;
            path.push_str(&rest[..start]);
            let value = route_values.get(&rest[start + 1..end])?;
            path.extend(utf8_percent_encode(value, PATH_SEGMENT));
            rest = &rest[end + 1..];
        }
        path.push_str(rest);
        Some(path)
    }
}

impl LinkGenerator for RouteTemplateLinkGenerator {
    fn uri_by_name(
        &self,
        endpoint_name: &str,
        route_values: &IndexMap<String, String>,
        scheme: &str,
        host: &str,
        path_base: &str,
    ) -> Option<String> {
        let template = self.templates.get(endpoint_name)?;
        let path = Self::expand(template, route_values)?;
        let mut link = format!("{scheme}://{host}");
        // Exactly one `/` between host, path base and endpoint path.
        for segment in [path_base, path.as_str()] {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                link.push('/');
                link.push_str(segment);
            }
        }
        Some(link)
    }
}

/// A way of computing the base address of a request.
pub trait ResolveBaseAddress: Send + Sync {
    fn resolve(&self, request: &ODataRequest) -> Option<Uri>;
}

impl<F> ResolveBaseAddress for F
where
    F: Fn(&ODataRequest) -> Option<Uri> + Send + Sync,
{
    fn resolve(&self, request: &ODataRequest) -> Option<Uri> {
        self(request)
    }
}

#[derive(Clone, Default)]
/// The default strategy: ask a [`LinkGenerator`] for the URL of the current endpoint.
pub struct LinkGeneratorBaseAddress {
    generator: Option<Arc<dyn LinkGenerator>>,
}

impl LinkGeneratorBaseAddress {
    pub fn new(generator: Arc<dyn LinkGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }
}

impl ResolveBaseAddress for LinkGeneratorBaseAddress {
    fn resolve(&self, request: &ODataRequest) -> Option<Uri> {
        let generator = self.generator.as_deref()?;
        let RouteContext {
            endpoint_name,
            route_values,
            scheme,
            host,
            path_base,
        } = request.route();
        let link = generator.uri_by_name(
            endpoint_name.as_deref()?,
            route_values,
            scheme,
            host,
            path_base,
        )?;
        match link
            .parse::<Uri>()
            .map_err(http::Error::from)
            .and_then(with_trailing_slash)
        {
            Ok(uri) => Some(uri),
            Err(e) => {
                tracing::debug!(
                    error.message = %e,
                    link = %link,
                    "The link generator produced an invalid base address"
                );
                None
            }
        }
    }
}

/// Make sure the path of `uri` ends with `/`, leaving its query untouched.
fn with_trailing_slash(uri: Uri) -> Result<Uri, http::Error> {
    if uri.path().ends_with('/') {
        return Ok(uri);
    }
    let path_and_query = match uri.query() {
        Some(query) => format!("{}/?{query}", uri.path()),
        None => format!("{}/", uri.path()),
    };
    let mut parts = uri.into_parts();
    parts.path_and_query = Some(path_and_query.parse()?);
    Ok(Uri::from_parts(parts)?)
}

#[derive(Clone)]
/// Computes the service root of a request.
///
/// The strategy is chosen once, when the resolver is built:
///
/// - an override, set via [`with_override`](Self::with_override): its result is
///   used as is, including `None`;
/// - otherwise, the URL of the current endpoint as built by a [`LinkGenerator`].
///
/// When the base address is `Some`, its path always ends with `/`.
/// `None` means "no base address available", it isn't an error.
pub struct BaseAddressResolver {
    strategy: Arc<dyn ResolveBaseAddress>,
    overridden: bool,
}

impl BaseAddressResolver {
    /// A resolver using the given link generator.
    pub fn new(generator: Arc<dyn LinkGenerator>) -> Self {
        Self {
            strategy: Arc::new(LinkGeneratorBaseAddress::new(generator)),
            overridden: false,
        }
    }

    /// A resolver that always defers to `strategy`.
    pub fn with_override(strategy: impl ResolveBaseAddress + 'static) -> Self {
        Self {
            strategy: Arc::new(strategy),
            overridden: true,
        }
    }

    pub fn resolve(&self, request: &ODataRequest) -> Option<Uri> {
        self.strategy.resolve(request)
    }
}

impl Default for BaseAddressResolver {
    /// A resolver without a link generator: it never finds a base address.
    fn default() -> Self {
        Self {
            strategy: Arc::new(LinkGeneratorBaseAddress::default()),
            overridden: false,
        }
    }
}

impl std::fmt::Debug for BaseAddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseAddressResolver")
            .field("overridden", &self.overridden)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::Empty;

    use super::*;

    fn request(route: RouteContext) -> ODataRequest {
        let request = http::Request::builder()
            .uri("/api/acme/odata/Customers")
            .header(http::header::HOST, "example.com")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let request = ODataRequest::new(request);
        let route = RouteContext {
            scheme: request.route().scheme.clone(),
            host: request.route().host.clone(),
            ..route
        };
        request.with_route(route)
    }

    fn generator() -> Arc<dyn LinkGenerator> {
        Arc::new(RouteTemplateLinkGenerator::new().route("odata", "/{tenant}/odata"))
    }

    #[test]
    fn base_address_is_built_from_the_current_endpoint() {
        let resolver = BaseAddressResolver::new(generator());
        let request = request(
            RouteContext::default()
                .endpoint_name("odata")
                .route_value("tenant", "acme corp")
                .path_base("/api"),
        );
        let base = resolver.resolve(&request).unwrap();
        assert_eq!(base.to_string(), "http://example.com/api/acme%20corp/odata/");
    }

    #[test]
    fn templates_without_a_leading_slash_stay_in_the_path() {
        let generator = RouteTemplateLinkGenerator::new().route("odata", "odata/{tenant}");
        let resolver = BaseAddressResolver::new(Arc::new(generator));
        let request = request(
            RouteContext::default()
                .endpoint_name("odata")
                .route_value("tenant", "acme"),
        );
        let base = resolver.resolve(&request).unwrap();
        assert_eq!(base.host(), Some("example.com"));
        assert_eq!(base.to_string(), "http://example.com/odata/acme/");
    }

    #[test]
    fn path_base_and_template_slashes_are_collapsed() {
        let generator = RouteTemplateLinkGenerator::new().route("odata", "/odata/");
        let link = generator
            .uri_by_name("odata", &IndexMap::new(), "https", "example.com", "/api/")
            .unwrap();
        assert_eq!(link, "https://example.com/api/odata");
    }

    #[test]
    fn trailing_slash_goes_before_the_query() {
        let uri = with_trailing_slash(Uri::from_static("https://example.com/odata?tenant=acme"))
            .unwrap();
        assert_eq!(uri.to_string(), "https://example.com/odata/?tenant=acme");

        let uri = with_trailing_slash(Uri::from_static("https://example.com/odata/")).unwrap();
        assert_eq!(uri.to_string(), "https://example.com/odata/");
    }

    #[test]
    fn no_base_address_without_an_endpoint_name() {
        let resolver = BaseAddressResolver::new(generator());
        let request = request(RouteContext::default().route_value("tenant", "acme"));
        assert_eq!(resolver.resolve(&request), None);
    }

    #[test]
    fn no_base_address_without_a_link_generator() {
        let resolver = BaseAddressResolver::default();
        let request = request(
            RouteContext::default()
                .endpoint_name("odata")
                .route_value("tenant", "acme"),
        );
        assert_eq!(resolver.resolve(&request), None);
    }

    #[test]
    fn missing_route_values_yield_no_base_address() {
        let resolver = BaseAddressResolver::new(generator());
        let request = request(RouteContext::default().endpoint_name("odata"));
        assert_eq!(resolver.resolve(&request), None);
    }

    #[test]
    fn overrides_are_used_even_when_they_yield_nothing() {
        let resolver = BaseAddressResolver::with_override(|_: &ODataRequest| -> Option<Uri> { None });
        let request = request(
            RouteContext::default()
                .endpoint_name("odata")
                .route_value("tenant", "acme"),
        );
        assert_eq!(resolver.resolve(&request), None);

        let resolver = BaseAddressResolver::with_override(|_: &ODataRequest| {
            Some(Uri::from_static("https://tenant.example.com/odata/"))
        });
        assert_eq!(
            resolver.resolve(&request).unwrap().to_string(),
            "https://tenant.example.com/odata/"
        );
    }
}
