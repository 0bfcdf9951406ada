use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

use crate::transport::TransportError;

pub type FxError = Box<dyn Error + Send + Sync>;

pub type ApiResult<T> = Result<T, ApiError>;

/// Built-in classification of a failed exchange, used whenever no custom
/// error decoder claimed the response.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StandardError {
    #[error("no response")]
    NoResponse,

    #[error("request cancelled")]
    Cancelled,

    #[error("client error {status}")]
    Client {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    #[error("server error {status}")]
    Server {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    #[error("connection: {0}")]
    Connection(#[source] TransportError),

    #[error("upload file not loaded: {}", path.display())]
    UploadFileNotLoaded { path: PathBuf },
}

impl StandardError {
    /// Status code for `Client`/`Server`, `None` otherwise.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StandardError::Client { status, .. } | StandardError::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Raw response body for `Client`/`Server`, `None` otherwise.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            StandardError::Client { body, .. } | StandardError::Server { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error(transparent)]
    Standard(#[from] StandardError),

    #[error("custom error: {0}")]
    Custom(FxError),

    #[error("build url error: {0}")]
    BuildUrl(#[from] url::ParseError),

    #[error("encode error: {0}")]
    Encode(FxError),

    #[error("decode error: {source}")]
    Decode { source: FxError, body: String },

    #[error("request rejected by delegate: {0}")]
    Rejected(FxError),
}

impl ApiError {
    pub fn encode_error(error: impl Into<FxError>) -> ApiError {
        ApiError::Encode(error.into())
    }

    pub fn rejected(error: impl Into<FxError>) -> ApiError {
        ApiError::Rejected(error.into())
    }

    #[inline]
    pub fn standard(&self) -> Option<&StandardError> {
        match self {
            ApiError::Standard(e) => Some(e),
            _ => None,
        }
    }

    /// Downcasts a custom error produced by an [`ErrorDecoder`](crate::prelude::ErrorDecoder).
    pub fn custom<C: Error + 'static>(&self) -> Option<&C> {
        match self {
            ApiError::Custom(e) => e.downcast_ref::<C>(),
            _ => None,
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Standard(StandardError::Cancelled))
    }

    #[inline]
    pub fn is_upload_file_not_loaded(&self) -> bool {
        matches!(
            self,
            ApiError::Standard(StandardError::UploadFileNotLoaded { .. })
        )
    }
}

pub fn body_as_text(headers: &HeaderMap, body: &Bytes, full_len: Option<usize>) -> String {
    const MAX: usize = 8 * 1024;
    let ct = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let slice = if body.len() > MAX {
        &body[..MAX]
    } else {
        &body[..]
    };
    let total_len = full_len.unwrap_or(body.len());
    if ct.is_empty() || ct.starts_with("application/json") || ct.starts_with("text/") {
        match std::str::from_utf8(slice) {
            Ok(s) => {
                if total_len > slice.len() {
                    format!("{}...", s)
                } else {
                    s.to_owned()
                }
            }
            Err(_) => format!("<non-utf8-text; {} bytes>", slice.len()),
        }
    } else {
        let b64 = B64.encode(slice);
        format!(
            "<non-text; {} bytes; base64:{}{}>",
            total_len,
            &b64[..b64.len().min(1024)],
            if b64.len() > 1024 { "..." } else { "" }
        )
    }
}
