use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use ubyte::{ByteUnit, ToByteUnit};

use super::RequestHead;
use crate::errors::{ExtractBufferedBodyError, SizeLimitExceeded, UnexpectedBufferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
/// An upper limit on the size of OData request bodies.
pub enum BodySizeLimit {
    /// Bodies larger than `max_size` are rejected.
    Enabled { max_size: ByteUnit },
    /// Bodies are buffered whatever their size.
    Disabled,
}

impl BodySizeLimit {
    /// The largest accepted body, if the limit is enabled.
    pub fn max_size(&self) -> Option<ByteUnit> {
        match self {
            BodySizeLimit::Enabled { max_size } => Some(*max_size),
            BodySizeLimit::Disabled => None,
        }
    }
}

impl Default for BodySizeLimit {
    fn default() -> Self {
        Self::Enabled {
            max_size: 2.megabytes(),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
/// A request body, collected in memory.
///
/// Wire readers parse from this buffer, which lets them work synchronously
/// no matter how the transport delivers the body.
pub struct BufferedBody {
    pub bytes: Bytes,
}

impl BufferedBody {
    /// Collect `body` in memory.
    ///
    /// When `body_size_limit` is enabled, the declared `Content-Length` is
    /// checked before reading anything, and the limit is enforced again while
    /// collecting: the header may understate the size of the body.
    pub async fn extract<B>(
        request_head: &RequestHead,
        body: B,
        body_size_limit: BodySizeLimit,
    ) -> Result<Self, ExtractBufferedBodyError>
    where
        B: http_body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(max_size) = body_size_limit.max_size() else {
            let collected = body
                .collect()
                .await
                .map_err(|e| UnexpectedBufferError { source: e.into() })?;
            return Ok(Self {
                bytes: collected.to_bytes(),
            });
        };

        let content_length = request_head.content_length();
        let exceeded = || SizeLimitExceeded {
            max_size,
            content_length,
        };
        if content_length.is_some_and(|declared| declared > max_size.as_u64()) {
            return Err(exceeded().into());
        }

        let max_n_bytes = usize::try_from(max_size.as_u64()).unwrap_or(usize::MAX);
        match Limited::new(body, max_n_bytes).collect().await {
            Ok(collected) => Ok(Self {
                bytes: collected.to_bytes(),
            }),
            Err(e) if e.is::<LengthLimitError>() => Err(exceeded().into()),
            Err(e) => Err(UnexpectedBufferError { source: e }.into()),
        }
    }
}

impl From<BufferedBody> for Bytes {
    fn from(buffered: BufferedBody) -> Self {
        buffered.bytes
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderMap;
    use http::header::CONTENT_LENGTH;
    use http_body_util::Full;
    use ubyte::ToByteUnit;

    use super::{BodySizeLimit, BufferedBody, Bytes};
    use crate::errors::ExtractBufferedBodyError;
    use crate::request::RequestHead;

    fn post(content_length: Option<u64>) -> RequestHead {
        let mut headers = HeaderMap::new();
        if let Some(len) = content_length {
            headers.insert(CONTENT_LENGTH, len.into());
        }
        RequestHead {
            method: http::Method::POST,
            target: "/odata/Customers".parse().unwrap(),
            version: http::Version::HTTP_11,
            headers,
        }
    }

    fn limit(bytes: u64) -> BodySizeLimit {
        BodySizeLimit::Enabled {
            max_size: bytes.bytes(),
        }
    }

    #[tokio::test]
    async fn bodies_within_the_limit_are_buffered() {
        let body = Full::new(Bytes::from_static(br#"{"Id": 1}"#));
        let buffered = BufferedBody::extract(&post(Some(9)), body, limit(64))
            .await
            .unwrap();
        assert_eq!(Bytes::from(buffered), Bytes::from_static(br#"{"Id": 1}"#));
    }

    #[tokio::test]
    async fn limit_is_enforced_while_collecting() {
        let body = Full::new(Bytes::from(vec![b' '; 1000]));
        let err = BufferedBody::extract(&post(None), body, limit(100))
            .await
            .unwrap_err();
        insta::assert_snapshot!(err, @"The request body is larger than the maximum size limit enforced by this server.");
    }

    #[tokio::test]
    async fn declared_length_is_checked_before_reading() {
        // The body would fit, but the request claims otherwise.
        let body = Full::new(Bytes::from(vec![b' '; 50]));
        let err = BufferedBody::extract(&post(Some(1000)), body, limit(100))
            .await
            .unwrap_err();
        let ExtractBufferedBodyError::SizeLimitExceeded(e) = err else {
            panic!("Expected a size limit error, got {err:?}");
        };
        assert_eq!(e.content_length, Some(1000));
        assert_eq!(e.max_size, 100.bytes());
    }

    #[tokio::test]
    async fn disabled_limit_buffers_everything() {
        let body = Full::new(Bytes::from(vec![b' '; 4096]));
        let buffered = BufferedBody::extract(&post(None), body, BodySizeLimit::Disabled)
            .await
            .unwrap();
        assert_eq!(buffered.bytes.len(), 4096);
    }
}
