mod common;
use common::*;

use apikit_core::codecs::Format;
use apikit_core::prelude::*;
use apikit_examples::*;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    fn push(&self, e: String) {
        self.0.lock().unwrap().push(e);
    }
}

impl DebugSink for Events {
    fn request_start(&self, dbg: DebugLevel, method: &Method, url: &str, _: &'static str) {
        self.push(format!("{dbg} start {method} {url}"));
    }
    fn request_headers(&self, dbg: DebugLevel, headers: &HeaderMap) {
        self.push(format!("{dbg} request headers {}", headers.len()));
    }
    fn request_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, _: usize) {
        self.push(format!("{dbg} request body {} {format:?}", body.len()));
    }
    fn response_status(&self, dbg: DebugLevel, status: StatusCode, _: &str, ok: bool) {
        self.push(format!("{dbg} status {} ok={ok}", status.as_u16()));
    }
    fn response_headers(&self, dbg: DebugLevel, _: &HeaderMap) {
        self.push(format!("{dbg} response headers"));
    }
    fn response_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, _: usize) {
        self.push(format!("{dbg} response body {} {format:?}", body.len()));
    }
    fn response_body_preview(&self, dbg: DebugLevel, _: &HeaderMap, body: &Bytes, _: Option<usize>) {
        self.push(format!("{dbg} preview {}", String::from_utf8_lossy(body)));
    }
    fn failure(&self, dbg: DebugLevel, _: &str, error: &ApiError) {
        self.push(format!("{dbg} failure {error}"));
    }
    fn running_requests(&self, dbg: DebugLevel, count: u64) {
        self.push(format!("{dbg} running {count}"));
    }
}

struct Loud;
impl Endpoint for Loud {
    fn path(&self) -> Cow<'_, str> {
        "get".into()
    }
    fn request_type(&self) -> RequestType<'_> {
        RequestType::UrlQuery
    }
    fn debug_level(&self) -> Option<DebugLevel> {
        Some(DebugLevel::VV)
    }
}

#[tokio::test]
async fn silent_by_default() {
    let events = Events::default();
    let (transport, mock) = mock()
        .replies([
            MockReply::ok_json(json_bytes(&())),
            MockReply::status(StatusCode::NOT_FOUND),
        ])
        .build();
    let api = adapter(transport).with_debug_sink(events.clone());

    api.request(&Get).await.unwrap();
    api.request(&Status(404)).await.unwrap_err();
    assert!(events.take().is_empty());
    mock.finish();
}

#[tokio::test]
async fn verbose_reports_lifecycle() {
    let events = Events::default();
    let (transport, mock) = mock()
        .replies([
            MockReply::ok_json(json_bytes(&())),
            MockReply::connection_error(),
        ])
        .build();
    let api = adapter(transport)
        .with_debug_level(DebugLevel::V)
        .with_debug_sink(events.clone());

    api.request(&Status(200)).await.unwrap();
    assert_eq!(
        events.take(),
        vec![
            "v start GET http://httpbin.org/status/200".to_string(),
            "v running 1".to_string(),
            "v running 0".to_string(),
            "v status 200 ok=true".to_string(),
        ]
    );

    api.request(&Get).await.unwrap_err();
    let got = events.take();
    assert_eq!(got.last().unwrap(), "v failure connection: mock connection refused");
    mock.finish();
}

#[tokio::test]
async fn endpoint_level_overrides_adapter_level() {
    let events = Events::default();
    let (transport, mock) = mock()
        .replies([
            MockReply::ok_json(json_bytes(&serde_json::json!({"ok": true}))),
            MockReply::status(StatusCode::BAD_REQUEST).with_body("bad input"),
        ])
        .build();
    let api = adapter(transport).with_debug_sink(events.clone());

    api.request(&Loud).await.unwrap();
    let got = events.take();
    assert!(got.contains(&"vv request headers 0".to_string()), "{got:?}");
    assert!(got.contains(&"vv response body 11 Text".to_string()), "{got:?}");
    assert!(!got.iter().any(|e| e.contains("request body")));

    api.request(&Loud).await.unwrap_err();
    let got = events.take();
    assert!(got.contains(&"vv status 400 ok=false".to_string()), "{got:?}");
    assert!(got.contains(&"vv preview bad input".to_string()), "{got:?}");
    mock.finish();
}

#[tokio::test]
async fn very_verbose_reports_request_body_format() {
    let events = Events::default();
    let (transport, mock) = mock()
        .reply(MockReply::ok_json(json_bytes(&())))
        .build();
    let api = adapter(transport)
        .with_debug_level(DebugLevel::VV)
        .with_debug_sink(events.clone());

    api.request(&UrlEncodedPost {
        parameters: HttpParameters::from([("a", "b")]),
    })
    .await
    .unwrap();
    let got = events.take();
    assert!(got.contains(&"vv request body 3 Text".to_string()), "{got:?}");
    mock.finish();
}
