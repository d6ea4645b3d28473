//! Errors that can occur while reading the body of an OData request.
//!
//! They come in two families:
//!
//! - [`ReadBodyError`]: the host is misconfigured, or asked for a type that can't be
//!   read. These are returned to the caller immediately.
//! - [`BodyReadFailure`]: the payload itself is unusable. These are reported to an
//!   [`ErrorSink`](crate::pipeline::ErrorSink) and the read falls back to the
//!   caller-supplied default value.
use http::StatusCode;
use ubyte::ByteUnit;

use crate::deserializer::DeserializationError;
use crate::reader::WireError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned by [`ODataInputFormatter::read_body`] when the body can't
/// be read at all.
///
/// [`ODataInputFormatter::read_body`]: crate::pipeline::ODataInputFormatter::read_body
pub enum ReadBodyError {
    #[error(transparent)]
    /// See [`MissingEdmModel`] for details.
    MissingModel(#[from] MissingEdmModel),
    #[error(transparent)]
    /// See [`MissingODataPath`] for details.
    MissingPath(#[from] MissingODataPath),
    #[error(transparent)]
    /// See [`UnsupportedType`] for details.
    UnsupportedType(#[from] UnsupportedType),
}

impl ReadBodyError {
    /// Convert a [`ReadBodyError`] into an HTTP response.
    pub fn into_response(&self) -> http::Response<String> {
        let mut body = String::new();
        self.response_body(&mut body)
            .expect("Failed to write into a string buffer");
        let status = match self {
            ReadBodyError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ReadBodyError::MissingModel(_) | ReadBodyError::MissingPath(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        response
    }

    pub(crate) fn response_body<W: std::fmt::Write>(&self, writer: &mut W) -> std::fmt::Result {
        write!(writer, "{self}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("The request carries no EDM model. Was it routed through an OData endpoint?")]
#[non_exhaustive]
/// The request has no [`EdmModel`](crate::edm::EdmModel) attached.
pub struct MissingEdmModel;

#[derive(Debug, thiserror::Error)]
#[error("The request carries no resolved OData path. Was it routed through an OData endpoint?")]
#[non_exhaustive]
/// The request has no [`ODataPath`](crate::path::ODataPath) attached.
pub struct MissingODataPath;

#[derive(Debug, thiserror::Error)]
#[error(
    "There is no OData deserializer for `{type_name}`. Register one for it, or read an `EdmValue` from a request path that resolves to an EDM type"
)]
#[non_exhaustive]
/// Nothing can read the target Rust type: no deserializer is registered for it
/// and, for [`EdmValue`](crate::edm::EdmValue) reads, none is registered for the
/// EDM type the request path resolves to.
pub struct UnsupportedType {
    /// The name of the Rust type the caller asked for.
    pub type_name: &'static str,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The payload couldn't be turned into a value.
///
/// The pipeline recovers from these: see [`ErrorSink`](crate::pipeline::ErrorSink).
pub enum BodyReadFailure {
    #[error(transparent)]
    /// See [`ExtractBufferedBodyError`] for details.
    Buffer(#[from] ExtractBufferedBodyError),
    #[error(transparent)]
    /// See [`BodyAlreadyConsumed`] for details.
    BodyAlreadyConsumed(#[from] BodyAlreadyConsumed),
    #[error("Failed to open a reader for the request body.\n{0}")]
    /// The wire reader refused the payload before reading started,
    /// e.g. because of its `Content-Type`.
    OpenReader(#[source] WireError),
    #[error(transparent)]
    /// See [`DeserializationError`] for details.
    Deserialization(#[from] DeserializationError),
    #[error(transparent)]
    /// See [`UnexpectedValueType`] for details.
    UnexpectedValueType(#[from] UnexpectedValueType),
}

#[derive(Debug, thiserror::Error)]
#[error("The request body has already been consumed.")]
#[non_exhaustive]
/// Somebody else took the body out of the request before this read.
pub struct BodyAlreadyConsumed;

#[derive(Debug, thiserror::Error)]
#[error("The deserializer selected for `{expected}` produced a value of a different type.")]
#[non_exhaustive]
/// The deserializer returned a value that isn't of the requested Rust type.
///
/// This happens when a deserializer registered with
/// [`register_native`](crate::DeserializerRegistry::register_native) doesn't
/// produce the type it was registered for.
pub struct UnexpectedValueType {
    /// The name of the Rust type the caller asked for.
    pub expected: &'static str,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned by [`BufferedBody::extract`] when the extraction fails.
///
/// [`BufferedBody::extract`]: crate::request::BufferedBody::extract
pub enum ExtractBufferedBodyError {
    #[error(transparent)]
    /// See [`SizeLimitExceeded`] for details.
    SizeLimitExceeded(#[from] SizeLimitExceeded),
    #[error(transparent)]
    /// See [`UnexpectedBufferError`] for details.
    UnexpectedBufferError(#[from] UnexpectedBufferError),
}

#[derive(Debug, thiserror::Error)]
#[error("The request body is larger than the maximum size limit enforced by this server.")]
#[non_exhaustive]
/// The request body is larger than the maximum size limit enforced by this server.
pub struct SizeLimitExceeded {
    /// The maximum size limit enforced by this server.
    pub max_size: ByteUnit,
    /// The value of the `Content-Length` header for the request that breached the body
    /// size limit.
    ///
    /// It's set to `None` if the `Content-Length` header was missing or invalid.
    /// If it's set to `Some(n)` and `n` is smaller than `max_size`, then the request
    /// lied about the size of its body in the `Content-Length` header.
    pub content_length: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
#[error("Something went wrong while reading the request body.")]
#[non_exhaustive]
/// Something went wrong while reading the request body, but we don't know what specifically.
pub struct UnexpectedBufferError {
    #[source]
    pub(crate) source: Box<dyn std::error::Error + Send + Sync>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_maps_to_415() {
        let err: ReadBodyError = UnsupportedType {
            type_name: "my_app::Invoice",
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        insta::assert_snapshot!(response.body(), @"There is no OData deserializer for `my_app::Invoice`. Register one for it, or read an `EdmValue` from a request path that resolves to an EDM type");
    }

    #[test]
    fn preconditions_map_to_500() {
        let err: ReadBodyError = MissingEdmModel.into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err: ReadBodyError = MissingODataPath.into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
