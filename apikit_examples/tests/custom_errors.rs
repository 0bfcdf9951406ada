mod common;
use common::*;

use apikit_core::prelude::*;
use apikit_examples::*;
use http::StatusCode;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
struct Problem {
    code: String,
    message: String,
}

#[derive(Debug)]
struct ApiProblem(Problem);

impl fmt::Display for ApiProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0.code, self.0.message)
    }
}

impl std::error::Error for ApiProblem {}

impl CustomError for ApiProblem {
    fn from_response(cx: &ErrorContext<'_>) -> Option<Self> {
        cx.json::<Problem>().map(ApiProblem)
    }
}

fn problem(status: StatusCode, code: &str) -> MockReply {
    MockReply::json(
        status,
        &serde_json::json!({"code": code, "message": "went wrong"}),
    )
}

#[tokio::test]
async fn custom_error_beats_standard_classification() {
    let (transport, mock) = mock()
        .replies([
            problem(StatusCode::NOT_FOUND, "E_MISSING"),
            problem(StatusCode::BAD_GATEWAY, "E_UPSTREAM"),
        ])
        .build();
    let api = adapter(transport).with_error_type::<ApiProblem>();

    let err = api.request(&Status(404)).await.unwrap_err();
    let custom = err.custom::<ApiProblem>().unwrap();
    assert_eq!(custom.0.code, "E_MISSING");
    assert_eq!(err.to_string(), "custom error: E_MISSING: went wrong");

    let err = api.request(&Status(502)).await.unwrap_err();
    assert_eq!(err.custom::<ApiProblem>().unwrap().0.code, "E_UPSTREAM");
    mock.finish();
}

#[tokio::test]
async fn unparsable_error_body_falls_back() {
    let (transport, mock) = mock()
        .reply(MockReply::status(StatusCode::NOT_FOUND).with_body("<html>not found</html>"))
        .build();
    let api = adapter(transport).with_error_type::<ApiProblem>();

    let err = api.request(&Status(404)).await.unwrap_err();
    assert!(err.custom::<ApiProblem>().is_none());
    assert_eq!(
        err.standard().and_then(|e| e.status()),
        Some(StatusCode::NOT_FOUND)
    );
    mock.finish();
}

#[tokio::test]
async fn success_never_reaches_custom_decoders() {
    let (transport, mock) = mock()
        .reply(MockReply::ok_json(json_bytes(
            &serde_json::json!({"code": "OK", "message": "fine"}),
        )))
        .build();
    let api = adapter(transport).with_error_type::<ApiProblem>();

    api.request(&Get).await.unwrap();
    mock.finish();
}

#[tokio::test]
async fn decoders_run_in_registration_order() {
    let (transport, mock) = mock()
        .reply(problem(StatusCode::UNPROCESSABLE_ENTITY, "E_FIRST"))
        .build();
    let api = adapter(transport)
        .with_error_fn(|cx| match cx.status() {
            Some(s) if s.is_server_error() => Some("server".into()),
            _ => None,
        })
        .with_error_fn(|cx| {
            let status = cx.status()?;
            Some(format!("{} failed with {}", cx.endpoint(), status.as_u16()).into())
        })
        .with_error_type::<ApiProblem>();

    let err = api.request(&Status(422)).await.unwrap_err();
    match err {
        ApiError::Custom(e) => {
            assert!(e.to_string().ends_with("Status failed with 422"), "{e}");
            assert!(e.downcast_ref::<ApiProblem>().is_none());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    mock.finish();
}

#[tokio::test]
async fn connection_failures_are_offered_to_decoders() {
    let (transport, mock) = mock()
        .replies([MockReply::connection_error(), MockReply::cancelled()])
        .build();
    let api = adapter(transport).with_error_fn(|cx| {
        cx.transport_error()
            .map(|e| -> FxError { format!("offline: {e}").into() })
    });

    let err = api.request(&Get).await.unwrap_err();
    match err {
        ApiError::Custom(e) => assert_eq!(e.to_string(), "offline: mock connection refused"),
        other => panic!("unexpected error: {other:?}"),
    }

    // Cancellation is always reported as such.
    let err = api.request(&Get).await.unwrap_err();
    assert!(err.is_cancelled());
    mock.finish();
}
