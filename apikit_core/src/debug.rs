use crate::codec::{self, Format};
use crate::error::ApiError;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
#[derive(Default)]
pub enum DebugLevel {
    #[default]
    None = 0,
    V = 1,
    VV = 2,
}

impl DebugLevel {
    #[inline]
    pub fn is_enabled(self) -> bool {
        self != DebugLevel::None
    }

    #[inline]
    pub fn is_verbose(self) -> bool {
        self >= DebugLevel::V
    }

    #[inline]
    pub fn is_very_verbose(self) -> bool {
        self >= DebugLevel::VV
    }
}

impl core::fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DebugLevel::None => f.write_str("none"),
            DebugLevel::V => f.write_str("v"),
            DebugLevel::VV => f.write_str("vv"),
        }
    }
}

/// Receives the adapter's diagnostic events. The adapter only calls it when
/// the effective [`DebugLevel`] asks for the event.
pub trait DebugSink: Send + Sync + 'static {
    fn request_start(&self, dbg: DebugLevel, method: &Method, url: &str, endpoint: &'static str);
    fn request_headers(&self, dbg: DebugLevel, headers: &HeaderMap);
    fn request_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize);

    fn response_status(&self, dbg: DebugLevel, status: StatusCode, url: &str, ok: bool);
    fn response_headers(&self, dbg: DebugLevel, headers: &HeaderMap);
    fn response_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize);
    fn response_body_preview(
        &self,
        dbg: DebugLevel,
        headers: &HeaderMap,
        body: &Bytes,
        full_len: Option<usize>,
    );

    /// Request finished without a usable HTTP response (transport failure,
    /// cancellation, rejection by the delegate).
    fn failure(&self, dbg: DebugLevel, url: &str, error: &ApiError);

    fn running_requests(&self, _dbg: DebugLevel, _count: u64) {}
}

#[derive(Default)]
pub struct NoopDebugSink;
impl DebugSink for NoopDebugSink {
    #[inline]
    fn request_start(&self, _: DebugLevel, _: &Method, _: &str, _: &'static str) {}
    #[inline]
    fn request_headers(&self, _: DebugLevel, _: &HeaderMap) {}
    #[inline]
    fn request_body(&self, _: DebugLevel, _: &Bytes, _: Format, _: usize) {}
    #[inline]
    fn response_status(&self, _: DebugLevel, _: StatusCode, _: &str, _: bool) {}
    #[inline]
    fn response_headers(&self, _: DebugLevel, _: &HeaderMap) {}
    #[inline]
    fn response_body(&self, _: DebugLevel, _: &Bytes, _: Format, _: usize) {}
    #[inline]
    fn response_body_preview(&self, _: DebugLevel, _: &HeaderMap, _: &Bytes, _: Option<usize>) {}
    #[inline]
    fn failure(&self, _: DebugLevel, _: &str, _: &ApiError) {}
}

/// Human-oriented lines on stderr.
#[derive(Default)]
pub struct StderrDebugSink;
impl DebugSink for StderrDebugSink {
    fn request_start(&self, dbg: DebugLevel, method: &Method, url: &str, endpoint: &'static str) {
        eprintln!("[apikit:{}] -> {} {} ({})", dbg, method, url, endpoint);
    }
    fn request_headers(&self, dbg: DebugLevel, headers: &HeaderMap) {
        eprintln!("[apikit:{}] request headers:", dbg);
        for (k, v) in headers.iter() {
            let vs = header_value_for_debug(k, v);
            eprintln!("  {}: {}", k, vs);
        }
    }
    fn request_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        eprintln!(
            "[apikit:{}] request body ({} bytes): {}",
            dbg,
            body.len(),
            preview
        );
    }

    fn response_status(&self, dbg: DebugLevel, status: StatusCode, url: &str, ok: bool) {
        if ok {
            eprintln!("[apikit:{}] <- {} {} (ok)", dbg, status.as_u16(), url);
        } else {
            eprintln!("[apikit:{}] <- {} {} (error)", dbg, status.as_u16(), url);
        }
    }
    fn response_headers(&self, dbg: DebugLevel, headers: &HeaderMap) {
        eprintln!("[apikit:{}] response headers:", dbg);
        for (k, v) in headers.iter() {
            let vs = header_value_for_debug(k, v);
            eprintln!("  {}: {}", k, vs);
        }
    }
    fn response_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        eprintln!(
            "[apikit:{}] response body ({} bytes): {}",
            dbg,
            body.len(),
            preview
        );
    }
    fn response_body_preview(
        &self,
        dbg: DebugLevel,
        headers: &HeaderMap,
        body: &Bytes,
        full_len: Option<usize>,
    ) {
        let preview = crate::error::body_as_text(headers, body, full_len);
        eprintln!("[apikit:{}] response body preview: {}", dbg, preview);
    }
    fn failure(&self, dbg: DebugLevel, url: &str, error: &ApiError) {
        eprintln!("[apikit:{}] <- {} (failed: {})", dbg, url, error);
    }
    fn running_requests(&self, dbg: DebugLevel, count: u64) {
        if dbg.is_very_verbose() {
            eprintln!("[apikit:{}] running requests: {}", dbg, count);
        }
    }
}

/// Forwards events to `tracing` under the `apikit` target.
#[cfg(feature = "tracing")]
#[derive(Default)]
pub struct TracingDebugSink;

#[cfg(feature = "tracing")]
impl DebugSink for TracingDebugSink {
    fn request_start(&self, _: DebugLevel, method: &Method, url: &str, endpoint: &'static str) {
        tracing::debug!(target: "apikit", %method, url, endpoint, "request");
    }
    fn request_headers(&self, _: DebugLevel, headers: &HeaderMap) {
        for (k, v) in headers.iter() {
            let value = header_value_for_debug(k, v);
            tracing::trace!(target: "apikit", header = %k, value = %value, "request header");
        }
    }
    fn request_body(&self, _: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        tracing::trace!(target: "apikit", len = body.len(), body = %preview, "request body");
    }
    fn response_status(&self, _: DebugLevel, status: StatusCode, url: &str, ok: bool) {
        if ok {
            tracing::debug!(target: "apikit", status = status.as_u16(), url, "response");
        } else {
            tracing::warn!(target: "apikit", status = status.as_u16(), url, "error response");
        }
    }
    fn response_headers(&self, _: DebugLevel, headers: &HeaderMap) {
        for (k, v) in headers.iter() {
            let value = header_value_for_debug(k, v);
            tracing::trace!(target: "apikit", header = %k, value = %value, "response header");
        }
    }
    fn response_body(&self, _: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        tracing::trace!(target: "apikit", len = body.len(), body = %preview, "response body");
    }
    fn response_body_preview(
        &self,
        _: DebugLevel,
        headers: &HeaderMap,
        body: &Bytes,
        full_len: Option<usize>,
    ) {
        let preview = crate::error::body_as_text(headers, body, full_len);
        tracing::debug!(target: "apikit", body = %preview, "error body");
    }
    fn failure(&self, _: DebugLevel, url: &str, error: &ApiError) {
        tracing::warn!(target: "apikit", url, %error, "request failed");
    }
    fn running_requests(&self, _: DebugLevel, count: u64) {
        tracing::trace!(target: "apikit", count, "running requests");
    }
}

fn is_sensitive_header_name(name: &HeaderName) -> bool {
    // HeaderName::as_str() is normalized to lowercase.
    let n = name.as_str();
    matches!(n, "authorization" | "proxy-authorization" | "cookie" | "set-cookie")
        || n.contains("token")
        || n.contains("secret")
        || n.contains("api-key")
        || n.contains("apikey")
        || n.ends_with("-key")
}

pub(crate) fn header_value_for_debug(name: &HeaderName, value: &HeaderValue) -> String {
    if is_sensitive_header_name(name) {
        "<redacted>".to_string()
    } else {
        value.to_str().unwrap_or("<non-utf8>").to_string()
    }
}
