use crate::mock::RecordedRequest;
use http::Method;
use http::header::HeaderName;
use std::collections::BTreeSet;
use std::fmt::{Debug, Write as _};

/// Fluent checks over one recorded request; every failure panics with the
/// request URL attached.
pub struct RequestAssert<'a> {
    req: &'a RecordedRequest,
}

pub fn assert_request(req: &RecordedRequest) -> RequestAssert<'_> {
    RequestAssert { req }
}

impl<'a> RequestAssert<'a> {
    fn check<T: Debug + PartialEq>(self, what: &str, expected: T, got: T) -> Self {
        if expected != got {
            self.fail(&format!(
                "{what} mismatch\n  expected: {expected:?}\n  got: {got:?}"
            ));
        }
        self
    }

    fn fail(&self, msg: &str) -> ! {
        panic!("{msg}\n  url: {}", self.req.url)
    }

    /// Matches the tail of the endpoint's type name, e.g. `"Status"`.
    pub fn endpoint(self, expected: &str) -> Self {
        let got = self.req.meta.endpoint;
        if !got.ends_with(expected) {
            self.fail(&format!("endpoint mismatch\n  expected: {expected}\n  got: {got}"));
        }
        self
    }

    pub fn method(self, expected: Method) -> Self {
        let got = self.req.meta.method.clone();
        self.check("method", expected, got)
    }

    pub fn authorized(self, expected: bool) -> Self {
        let got = self.req.meta.authorized;
        self.check("authorized", expected, got)
    }

    pub fn path(self, expected: &str) -> Self {
        let req = self.req;
        self.check("path", expected, req.url.path())
    }

    pub fn timeout(self, expected: Option<std::time::Duration>) -> Self {
        let got = self.req.timeout;
        self.check("timeout", expected, got)
    }

    pub fn no_query(self) -> Self {
        if let Some(q) = self.req.url.query() {
            self.fail(&format!("expected no query component, got {q:?}"));
        }
        self
    }

    pub fn body_present(self) -> Self {
        if self.req.body.is_none() {
            self.fail("expected a body, got none");
        }
        self
    }

    pub fn body_absent(self) -> Self {
        if let Some(b) = &self.req.body {
            self.fail(&format!("expected no body, got {} bytes", b.len()));
        }
        self
    }

    pub fn body_eq(self, expected: &[u8]) -> Self {
        let req = self.req;
        let got = req.body.as_deref().map(String::from_utf8_lossy);
        self.check("body", Some(String::from_utf8_lossy(expected)), got)
    }

    pub fn body_json(self, expected: serde_json::Value) -> Self {
        let got: Option<serde_json::Value> = self
            .req
            .body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok());
        self.check("json body", Some(expected), got)
    }

    pub fn header(self, name: impl IntoHeaderName, expected: &str) -> Self {
        let name = name.into_header_name();
        let req = self.req;
        match req.headers.get(&name).map(|v| v.to_str()) {
            Some(Ok(v)) if v == expected => self,
            Some(got) => self.fail(&format!(
                "header mismatch\n  header: {name}\n  expected: {expected}\n  got: {got:?}"
            )),
            None => self.fail(&format!(
                "missing header\n  header: {name}\n  expected: {expected}"
            )),
        }
    }

    pub fn header_absent(self, name: impl IntoHeaderName) -> Self {
        let name = name.into_header_name();
        if let Some(v) = self.req.headers.get(&name) {
            self.fail(&format!("expected header absent\n  header: {name}\n  got: {v:?}"));
        }
        self
    }

    pub fn query_has(self, key: &str, expected_value: &str) -> Self {
        let pairs = self.query_pairs();
        if !pairs.iter().any(|(k, v)| k == key && v == expected_value) {
            self.fail(&format!(
                "missing query pair\n  expected: {key}={expected_value}\n  got: {}",
                format_pairs(&pairs)
            ));
        }
        self
    }

    pub fn query_absent(self, key: &str) -> Self {
        let pairs = self.query_pairs();
        if pairs.iter().any(|(k, _)| k == key) {
            self.fail(&format!(
                "expected query key absent\n  key: {key}\n  got: {}",
                format_pairs(&pairs)
            ));
        }
        self
    }

    pub fn query_keys_exact(self, expected_keys: &[&str]) -> Self {
        let got: BTreeSet<String> = self.query_pairs().into_iter().map(|(k, _)| k).collect();
        let exp: BTreeSet<String> = expected_keys.iter().map(|s| s.to_string()).collect();
        self.check("query key-set", exp, got)
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        self.req
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

pub trait IntoHeaderName {
    fn into_header_name(self) -> HeaderName;
}

impl IntoHeaderName for HeaderName {
    fn into_header_name(self) -> HeaderName {
        self
    }
}

impl IntoHeaderName for &'static HeaderName {
    fn into_header_name(self) -> HeaderName {
        self.clone()
    }
}

impl IntoHeaderName for &'static str {
    fn into_header_name(self) -> HeaderName {
        HeaderName::from_bytes(self.as_bytes())
            .unwrap_or_else(|_| panic!("invalid header name literal: {self:?}"))
    }
}

fn format_pairs(pairs: &[(String, String)]) -> String {
    let mut s = String::new();
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        let _ = write!(s, "{k}={v}");
    }
    s
}
