use crate::codec::Decodes;
use crate::codec::json::Json;
use crate::codec::text::Text;
use crate::error::{ApiError, ApiResult, FxError, StandardError, body_as_text};
use crate::transport::{TransportError, TransportErrorKind};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::error::Error;
use std::marker::PhantomData;
use std::sync::Arc;

/// Fully read response, before classification.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What a custom error decoder gets to look at.
///
/// For HTTP error statuses `status`, `headers` and `body` are set; for
/// transport failures only `transport_error` is.
#[derive(Clone, Copy, Debug)]
pub struct ErrorContext<'a> {
    endpoint: &'static str,
    status: Option<StatusCode>,
    headers: Option<&'a HeaderMap>,
    body: Option<&'a Bytes>,
    transport_error: Option<&'a TransportError>,
}

impl<'a> ErrorContext<'a> {
    pub fn for_response(endpoint: &'static str, resp: &'a RawResponse) -> Self {
        Self {
            endpoint,
            status: Some(resp.status),
            headers: Some(&resp.headers),
            body: Some(&resp.body),
            transport_error: None,
        }
    }

    pub fn for_transport_error(endpoint: &'static str, err: &'a TransportError) -> Self {
        Self {
            endpoint,
            status: None,
            headers: None,
            body: None,
            transport_error: Some(err),
        }
    }

    #[inline]
    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> Option<&'a HeaderMap> {
        self.headers
    }

    #[inline]
    pub fn body(&self) -> Option<&'a Bytes> {
        self.body
    }

    #[inline]
    pub fn transport_error(&self) -> Option<&'a TransportError> {
        self.transport_error
    }

    /// The body as UTF-8 text; `None` when there is no body or it is not UTF-8.
    pub fn text(&self) -> Option<String> {
        let body = self.body?;
        <Text as Decodes<String>>::decode(body).ok()
    }

    /// Decodes the body as JSON; `None` when there is no body or it does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        let body = self.body?;
        <Json as Decodes<T>>::decode(body).ok()
    }
}

/// One strategy in the custom error chain. Returning `None` passes the
/// response on to the next decoder, and finally to standard classification.
pub trait ErrorDecoder: Send + Sync + 'static {
    fn decode(&self, cx: &ErrorContext<'_>) -> Option<FxError>;
}

impl<F> ErrorDecoder for F
where
    F: Fn(&ErrorContext<'_>) -> Option<FxError> + Send + Sync + 'static,
{
    fn decode(&self, cx: &ErrorContext<'_>) -> Option<FxError> {
        self(cx)
    }
}

/// Typed custom error built from a failed exchange.
pub trait CustomError: Error + Send + Sync + Sized + 'static {
    fn from_response(cx: &ErrorContext<'_>) -> Option<Self>;
}

/// Adapts a [`CustomError`] type into the decoder chain.
pub struct CustomErrorDecoder<C>(PhantomData<fn() -> C>);

impl<C> Default for CustomErrorDecoder<C> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<C: CustomError> ErrorDecoder for CustomErrorDecoder<C> {
    fn decode(&self, cx: &ErrorContext<'_>) -> Option<FxError> {
        C::from_response(cx).map(|e| Box::new(e) as FxError)
    }
}

pub(crate) type ErrorDecoders = Vec<Arc<dyn ErrorDecoder>>;

fn try_custom(decoders: &[Arc<dyn ErrorDecoder>], cx: &ErrorContext<'_>) -> Option<ApiError> {
    decoders
        .iter()
        .find_map(|d| d.decode(cx))
        .map(ApiError::Custom)
}

/// Cancelled -> no response -> custom chain -> connection.
pub(crate) fn classify_transport_error(
    endpoint: &'static str,
    err: TransportError,
    decoders: &[Arc<dyn ErrorDecoder>],
) -> ApiError {
    match err.kind() {
        TransportErrorKind::Cancelled => StandardError::Cancelled.into(),
        TransportErrorKind::NoResponse => StandardError::NoResponse.into(),
        TransportErrorKind::Connection => {
            let cx = ErrorContext::for_transport_error(endpoint, &err);
            match try_custom(decoders, &cx) {
                Some(custom) => custom,
                None => StandardError::Connection(err).into(),
            }
        }
    }
}

/// 4xx/5xx go through the custom chain, then become `Client`/`Server`.
/// Anything below 400 is a success.
pub(crate) fn classify_response(
    endpoint: &'static str,
    resp: RawResponse,
    decoders: &[Arc<dyn ErrorDecoder>],
) -> ApiResult<RawResponse> {
    let status = resp.status;
    if !(status.is_client_error() || status.is_server_error()) {
        return Ok(resp);
    }
    if let Some(custom) = try_custom(decoders, &ErrorContext::for_response(endpoint, &resp)) {
        return Err(custom);
    }
    let RawResponse { status, headers, body } = resp;
    let err = if status.is_client_error() {
        StandardError::Client {
            status,
            headers,
            body,
        }
    } else {
        StandardError::Server {
            status,
            headers,
            body,
        }
    };
    Err(err.into())
}

/// Decodes a successful body as JSON. An empty body decodes as `null`, so
/// `()` and `Option<_>` responses accept 204.
pub(crate) fn decode_json<T: DeserializeOwned>(resp: &RawResponse) -> ApiResult<T> {
    let empty = resp.body.iter().all(u8::is_ascii_whitespace);
    let bytes = if empty {
        Bytes::from_static(b"null")
    } else {
        resp.body.clone()
    };
    <Json as Decodes<T>>::decode(&bytes).map_err(|e| ApiError::Decode {
        source: e.into(),
        body: body_as_text(&resp.headers, &resp.body, Some(resp.body.len())),
    })
}
