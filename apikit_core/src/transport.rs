use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use url::Url;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;

use std::error::Error;
use std::{fmt, io};

#[derive(Clone, Debug)]
pub struct RequestMeta {
    pub endpoint: &'static str,
    pub method: Method,
    pub authorized: bool,
}

pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Outgoing payload. File-backed multipart bodies are streamed; the length
/// is known up front either way.
pub enum RequestBody {
    Full(Bytes),
    Stream { length: u64, stream: BodyStream },
}

impl RequestBody {
    #[inline]
    pub fn len(&self) -> u64 {
        match self {
            RequestBody::Full(b) => b.len() as u64,
            RequestBody::Stream { length, .. } => *length,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload when it is already in memory.
    #[inline]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Full(b) => Some(b),
            RequestBody::Stream { .. } => None,
        }
    }

    /// Drains the body into one buffer.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            RequestBody::Full(b) => Ok(b),
            RequestBody::Stream { length, mut stream } => {
                let mut buf = BytesMut::with_capacity(usize::try_from(length).unwrap_or(0));
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Full(b)
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Full(b) => f.debug_tuple("Full").field(&b.len()).finish(),
            RequestBody::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish_non_exhaustive()
            }
        }
    }
}

/// Fully formed request, ready to hand to a [`Transport`].
#[derive(Debug)]
pub struct BuiltRequest {
    pub meta: RequestMeta,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransportErrorKind {
    /// Connection-level failure (DNS, TLS, reset, timeout, broken body stream).
    Connection,
    /// The transport gave up because the request was cancelled.
    Cancelled,
    /// The exchange finished without an HTTP response object.
    NoResponse,
}

#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    source: Option<crate::error::FxError>,
}

impl TransportError {
    #[inline]
    pub fn new(e: impl Error + Send + Sync + 'static) -> Self {
        Self {
            kind: TransportErrorKind::Connection,
            source: Some(Box::new(e)),
        }
    }

    #[inline]
    pub fn cancelled() -> Self {
        Self {
            kind: TransportErrorKind::Cancelled,
            source: None,
        }
    }

    #[inline]
    pub fn no_response() -> Self {
        Self {
            kind: TransportErrorKind::NoResponse,
            source: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.kind) {
            (Some(e), _) => write!(f, "{}", e),
            (None, TransportErrorKind::Cancelled) => f.write_str("cancelled"),
            (None, TransportErrorKind::NoResponse) => f.write_str("no response"),
            (None, TransportErrorKind::Connection) => f.write_str("connection failed"),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e)
    }
}

pub trait TransportBody: Send + 'static {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, TransportError>> + Send + 'a>>;
}

pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
    pub body: Box<dyn TransportBody>,
}

/// Injectable transport layer.
///
/// Contract:
/// - Must honor `BuiltRequest` fields (url/headers/body/timeout) as appropriate.
/// - Must not leak a concrete HTTP client type in its public surface.
/// - Reports failures through [`TransportError`]; cancellation and missing
///   responses use the dedicated kinds so the adapter can classify them.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        req: BuiltRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'static>>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_impl::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;

    #[derive(Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        #[inline]
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        #[inline]
        pub fn client(&self) -> &reqwest::Client {
            &self.client
        }
    }

    struct ReqwestBody {
        resp: reqwest::Response,
    }

    impl TransportBody for ReqwestBody {
        fn next_chunk<'a>(
            &'a mut self,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, TransportError>> + Send + 'a>>
        {
            Box::pin(async move { self.resp.chunk().await.map_err(TransportError::from) })
        }
    }

    impl Transport for ReqwestTransport {
        fn send(
            &self,
            req: BuiltRequest,
        ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'static>>
        {
            let client = self.client.clone();
            Box::pin(async move {
                let mut rb = client
                    .request(req.meta.method, req.url)
                    .headers(req.headers);
                match req.body {
                    Some(RequestBody::Full(b)) => rb = rb.body(b),
                    Some(RequestBody::Stream { stream, .. }) => {
                        rb = rb.body(reqwest::Body::wrap_stream(stream))
                    }
                    None => {}
                }
                if let Some(t) = req.timeout {
                    rb = rb.timeout(t);
                }
                let resp = rb.send().await.map_err(TransportError::from)?;
                let status = resp.status();
                let headers = resp.headers().clone();
                let content_length = resp.content_length();
                Ok(TransportResponse {
                    status,
                    headers,
                    content_length,
                    body: Box::new(ReqwestBody { resp }),
                })
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug)]
    struct Refused;
    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }
    impl Error for Refused {}

    #[test]
    fn kinds_and_display() {
        let e = TransportError::new(Refused);
        assert_eq!(e.kind(), TransportErrorKind::Connection);
        assert_eq!(e.to_string(), "connection refused");
        assert!(e.source().is_some());

        assert_eq!(TransportError::cancelled().kind(), TransportErrorKind::Cancelled);
        assert_eq!(TransportError::no_response().to_string(), "no response");
        assert!(TransportError::no_response().source().is_none());
    }

    #[tokio::test]
    async fn streamed_body_collects_in_order() {
        let chunks = vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cde"))];
        let body = RequestBody::Stream {
            length: 5,
            stream: Box::pin(futures_util::stream::iter(chunks)),
        };
        assert_eq!(body.len(), 5);
        assert!(body.as_bytes().is_none());
        assert_eq!(format!("{body:?}"), "Stream { length: 5, .. }");
        assert_eq!(&body.collect().await.unwrap()[..], b"abcde");

        let full = RequestBody::from(Bytes::from_static(b"xyz"));
        assert_eq!(full.as_bytes().map(|b| &b[..]), Some(&b"xyz"[..]));
    }
}
