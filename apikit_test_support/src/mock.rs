use apikit_core::transport::*;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub meta: RequestMeta,
    pub url: url::Url,
    pub headers: http::HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

/// One scripted outcome, consumed by one `send`.
#[derive(Clone, Debug)]
pub enum MockReply {
    Response {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    Fail(TransportErrorKind),
    /// Never completes; pair with cancellation or a timeout.
    Hang,
}

impl MockReply {
    pub fn ok_json(body: Bytes) -> Self {
        Self::status(StatusCode::OK).with_json_body(body)
    }

    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        Self::status(status).with_json_body(crate::json_bytes(value))
    }

    pub fn ok_text(body: impl Into<Bytes>) -> Self {
        Self::status(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_body(body)
    }

    pub fn status(status: StatusCode) -> Self {
        Self::Response {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn connection_error() -> Self {
        Self::Fail(TransportErrorKind::Connection)
    }

    pub fn no_response() -> Self {
        Self::Fail(TransportErrorKind::NoResponse)
    }

    pub fn cancelled() -> Self {
        Self::Fail(TransportErrorKind::Cancelled)
    }

    pub fn hang() -> Self {
        Self::Hang
    }

    /// No-op on non-response replies.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        if let Self::Response { headers, .. } = &mut self {
            headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, new_body: impl Into<Bytes>) -> Self {
        if let Self::Response { body, .. } = &mut self {
            *body = new_body.into();
        }
        self
    }

    fn with_json_body(self, body: Bytes) -> Self {
        self.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body)
    }
}

struct OneShotBody {
    chunk: Option<Bytes>,
}

impl TransportBody for OneShotBody {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, TransportError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.chunk.take()) })
    }
}

#[derive(Debug)]
struct MockState {
    recorded: Mutex<Vec<RecordedRequest>>,
    replies: Mutex<VecDeque<MockReply>>,
}

#[derive(Clone)]
pub struct MockTransport {
    st: Arc<MockState>,
}

pub struct MockHandle {
    st: Arc<MockState>,
    finished: bool,
}

#[derive(Default)]
pub struct MockBuilder {
    replies: Vec<MockReply>,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, r: MockReply) -> Self {
        self.replies.push(r);
        self
    }

    pub fn replies(mut self, rs: impl IntoIterator<Item = MockReply>) -> Self {
        self.replies.extend(rs);
        self
    }

    pub fn build(self) -> (MockTransport, MockHandle) {
        let st = Arc::new(MockState {
            recorded: Mutex::new(Vec::new()),
            replies: Mutex::new(self.replies.into_iter().collect()),
        });
        (
            MockTransport { st: st.clone() },
            MockHandle {
                st,
                finished: false,
            },
        )
    }
}

pub fn mock() -> MockBuilder {
    MockBuilder::new()
}

impl MockHandle {
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.st.recorded.lock().unwrap().clone()
    }

    pub fn recorded_len(&self) -> usize {
        self.st.recorded.lock().unwrap().len()
    }

    pub fn last(&self) -> RecordedRequest {
        self.st
            .recorded
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was recorded")
    }

    pub fn assert_recorded_len(&self, expected: usize) {
        let got = self.recorded_len();
        if got != expected {
            let reqs = self.recorded();
            panic!(
                "recorded request count mismatch\n  expected: {expected}\n  got: {got}\n  recorded:\n{:#?}",
                reqs
            );
        }
    }

    pub fn remaining_replies(&self) -> usize {
        self.st.replies.lock().unwrap().len()
    }

    pub fn assert_no_remaining_replies(&self) {
        let left = self.remaining_replies();
        if left != 0 {
            panic!("mock replies not fully consumed: remaining={left}");
        }
    }

    pub fn finish(mut self) {
        self.assert_no_remaining_replies();
        self.finished = true;
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            return;
        }
        let left = self.st.replies.lock().unwrap().len();
        if left != 0 {
            panic!("mock replies not fully consumed (drop): remaining={left}");
        }
    }
}

fn transport_failure(kind: TransportErrorKind) -> TransportError {
    match kind {
        TransportErrorKind::Cancelled => TransportError::cancelled(),
        TransportErrorKind::NoResponse => TransportError::no_response(),
        TransportErrorKind::Connection => TransportError::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "mock connection refused",
        )),
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        req: BuiltRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'static>>
    {
        // In-memory bodies are recorded right away; streamed ones once drained.
        let (body, pending) = match req.body {
            Some(RequestBody::Full(b)) => (Some(b), None),
            Some(streamed) => (None, Some(streamed)),
            None => (None, None),
        };
        let slot = {
            let mut recorded = self.st.recorded.lock().unwrap();
            recorded.push(RecordedRequest {
                meta: req.meta,
                url: req.url,
                headers: req.headers,
                body,
                timeout: req.timeout,
            });
            recorded.len() - 1
        };

        let reply = self.st.replies.lock().unwrap().pop_front();
        let reply = reply.unwrap_or_else(|| {
            let last = self.st.recorded.lock().unwrap().last().cloned();
            panic!(
                "MockTransport: no more scripted replies, but send() was called.\nlast_request={:#?}",
                last
            );
        });

        let st = self.st.clone();
        Box::pin(async move {
            if let Some(pending) = pending {
                let bytes = pending.collect().await.map_err(TransportError::new)?;
                st.recorded.lock().unwrap()[slot].body = Some(bytes);
            }
            match reply {
                MockReply::Response {
                    status,
                    headers,
                    body,
                } => Ok(TransportResponse {
                    status,
                    headers,
                    content_length: Some(body.len() as u64),
                    body: Box::new(OneShotBody { chunk: Some(body) }),
                }),
                MockReply::Fail(kind) => Err(transport_failure(kind)),
                MockReply::Hang => futures_util::future::pending().await,
            }
        })
    }
}
