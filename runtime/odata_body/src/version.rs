//! Negotiation of the OData protocol version reported back to the client.
use std::fmt;
use std::str::FromStr;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::request::RequestHead;

/// The header carrying the highest protocol version the client understands.
pub const ODATA_MAX_VERSION: HeaderName = HeaderName::from_static("odata-maxversion");
/// The header carrying the protocol version of the request payload.
pub const ODATA_VERSION: HeaderName = HeaderName::from_static("odata-version");

/// The version used when the client expresses no preference.
pub const DEFAULT_ODATA_VERSION: ODataVersion = ODataVersion::V4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// The versions of the OData protocol this crate can negotiate.
pub enum ODataVersion {
    /// OData 4.0
    V4,
    /// OData 4.01
    V401,
}

impl ODataVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ODataVersion::V4 => "4.0",
            ODataVersion::V401 => "4.01",
        }
    }

    /// The version token, ready to be used as the value of an `OData-Version` header.
    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ODataVersion {
    type Err = UnknownODataVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4.0" | "4" => Ok(ODataVersion::V4),
            "4.01" => Ok(ODataVersion::V401),
            other => Err(UnknownODataVersion {
                actual: other.to_owned(),
            }),
        }
    }
}

impl<'de> serde::Deserialize<'de> for ODataVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Environment-based configuration sources hand us `4.01` as a float
        // rather than a string.
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = ODataVersion;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an OData version, either `4.0` or `4.01`")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
                // `f32` sources don't round-trip `4.01` exactly.
                if (v - 4.0).abs() < 1e-6 {
                    Ok(ODataVersion::V4)
                } else if (v - 4.01).abs() < 1e-6 {
                    Ok(ODataVersion::V401)
                } else {
                    Err(E::custom(UnknownODataVersion {
                        actual: v.to_string(),
                    }))
                }
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

impl serde::Serialize for ODataVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("`{actual}` is not a supported OData version. Expected `4.0` or `4.01`")]
#[non_exhaustive]
/// A version token that doesn't match any supported [`ODataVersion`].
pub struct UnknownODataVersion {
    /// The token that failed to parse.
    pub actual: String,
}

#[derive(Debug, Clone, Copy)]
/// Picks the protocol version to report in the response.
///
/// The first of the following wins:
///
/// 1. the `OData-MaxVersion` request header
/// 2. the `OData-Version` request header
/// 3. the configured default version
///
/// Headers that are present but can't be parsed are ignored.
pub struct VersionNegotiator {
    default_version: ODataVersion,
}

impl VersionNegotiator {
    pub fn new(default_version: ODataVersion) -> Self {
        Self { default_version }
    }

    pub fn default_version(&self) -> ODataVersion {
        self.default_version
    }

    pub fn resolve_response_version(&self, request_head: &RequestHead) -> ODataVersion {
        self.resolve_from_headers(&request_head.headers)
    }

    pub fn resolve_from_headers(&self, headers: &HeaderMap) -> ODataVersion {
        header_version(headers, &ODATA_MAX_VERSION)
            .or_else(|| header_version(headers, &ODATA_VERSION))
            .unwrap_or(self.default_version)
    }
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_ODATA_VERSION)
    }
}

fn header_version(headers: &HeaderMap, name: &HeaderName) -> Option<ODataVersion> {
    let value = headers.get(name)?;
    let parsed = value
        .to_str()
        .ok()
        .map(|raw| raw.parse::<ODataVersion>());
    match parsed {
        Some(Ok(version)) => Some(version),
        Some(Err(e)) => {
            tracing::debug!(header = %name, error.message = %e, "Ignoring unsupported OData version header");
            None
        }
        None => {
            tracing::debug!(header = %name, "Ignoring non-UTF8 OData version header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&HeaderName, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert((*name).clone(), HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn max_version_header_is_returned_on_its_own() {
        let negotiator = VersionNegotiator::default();
        let h = headers(&[(&ODATA_MAX_VERSION, "4.01")]);
        assert_eq!(negotiator.resolve_from_headers(&h), ODataVersion::V401);
    }

    #[test]
    fn max_version_wins_over_version() {
        let negotiator = VersionNegotiator::default();
        let h = headers(&[(&ODATA_MAX_VERSION, "4.0"), (&ODATA_VERSION, "4.01")]);
        assert_eq!(negotiator.resolve_from_headers(&h), ODataVersion::V4);
    }

    #[test]
    fn version_header_is_used_without_max_version() {
        let negotiator = VersionNegotiator::default();
        let h = headers(&[(&ODATA_VERSION, "4.01")]);
        assert_eq!(negotiator.resolve_from_headers(&h), ODataVersion::V401);
    }

    #[test]
    fn default_is_used_without_headers() {
        let negotiator = VersionNegotiator::new(ODataVersion::V401);
        assert_eq!(
            negotiator.resolve_from_headers(&HeaderMap::new()),
            ODataVersion::V401
        );
        assert_eq!(
            VersionNegotiator::default().resolve_from_headers(&HeaderMap::new()),
            DEFAULT_ODATA_VERSION
        );
    }

    #[test]
    fn unparseable_headers_are_skipped() {
        let negotiator = VersionNegotiator::default();
        let h = headers(&[(&ODATA_MAX_VERSION, "banana"), (&ODATA_VERSION, "4.01")]);
        assert_eq!(negotiator.resolve_from_headers(&h), ODataVersion::V401);
    }

    #[test]
    fn unknown_version_error() {
        let err = "3.0".parse::<ODataVersion>().unwrap_err();
        insta::assert_snapshot!(err, @"`3.0` is not a supported OData version. Expected `4.0` or `4.01`");
    }
}
