use crate::encoding::EncodedBody;
use crate::transport::RequestBody;
use core::time::Duration;
use http::header::{ACCEPT, HeaderName};
use http::{HeaderMap, HeaderValue};

/// Client-level defaults every request starts from.
///
/// Layering, outermost first: policy headers -> decoder `Accept` (only when
/// the policy did not set one) -> body encoder headers (always win).
#[derive(Clone, Debug, Default)]
pub struct Policy {
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl Policy {
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[inline]
    pub fn set_timeout(&mut self, d: Duration) {
        self.timeout = Some(d);
    }

    #[inline]
    pub fn clear_timeout(&mut self) {
        self.timeout = None;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn remove_header(&mut self, name: HeaderName) {
        let _ = self.headers.remove(name);
    }

    /// Final header set for one request.
    pub(crate) fn merge(&self, accept: Option<&'static str>, encoded: HeaderMap) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(ct) = accept
            && !ct.is_empty()
            && !headers.contains_key(ACCEPT)
        {
            headers.insert(ACCEPT, HeaderValue::from_static(ct));
        }
        headers.extend(encoded);
        headers
    }

    pub(crate) fn apply(
        &self,
        accept: Option<&'static str>,
        encoded: EncodedBody,
    ) -> (HeaderMap, Option<RequestBody>, Option<Duration>) {
        let headers = self.merge(accept, encoded.headers);
        (headers, encoded.body, self.timeout)
    }
}
