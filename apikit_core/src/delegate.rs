use crate::endpoint::Endpoint;
use crate::error::{ApiError, ApiResult};
use crate::secret::SecretString;
use crate::transport::BuiltRequest;
use http::HeaderValue;
use http::header::AUTHORIZATION;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

pub type DelegateFuture<'a> = Pin<Box<dyn Future<Output = ApiResult<BuiltRequest>> + Send + 'a>>;

/// Hook around every dispatch.
///
/// `will_request` runs after the request is built and before it is sent; it
/// may return a replacement request or an error, in which case nothing is
/// sent and the error is the result of the call.
/// `did_update_running_request_count` is a notification only.
pub trait AdapterDelegate: Send + Sync + 'static {
    fn will_request<'a>(
        &'a self,
        request: BuiltRequest,
        _endpoint: &'a dyn Endpoint,
    ) -> DelegateFuture<'a> {
        Box::pin(async move { Ok(request) })
    }

    fn did_update_running_request_count(&self, _count: u64) {}
}

#[derive(Default)]
pub struct NoDelegate;
impl AdapterDelegate for NoDelegate {}

/// Adds `Authorization: Bearer <token>` to endpoints reporting `authorized()`.
pub struct BearerAuth {
    token: RwLock<SecretString>,
}

impl BearerAuth {
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self {
            token: RwLock::new(token.into()),
        }
    }

    /// Swaps the token used by subsequent requests.
    pub fn set_token(&self, token: impl Into<SecretString>) {
        let token = token.into();
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn header_value(&self) -> ApiResult<HeaderValue> {
        let token = match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
            .map_err(ApiError::rejected)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl AdapterDelegate for BearerAuth {
    fn will_request<'a>(
        &'a self,
        mut request: BuiltRequest,
        endpoint: &'a dyn Endpoint,
    ) -> DelegateFuture<'a> {
        Box::pin(async move {
            if endpoint.authorized() {
                request.headers.insert(AUTHORIZATION, self.header_value()?);
            }
            Ok(request)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::RequestMeta;
    use std::borrow::Cow;

    struct Secured(bool);
    impl Endpoint for Secured {
        fn path(&self) -> Cow<'_, str> {
            "bearer".into()
        }
        fn authorized(&self) -> bool {
            self.0
        }
    }

    fn built() -> BuiltRequest {
        BuiltRequest {
            meta: RequestMeta {
                endpoint: "Secured",
                method: http::Method::GET,
                authorized: false,
            },
            url: url::Url::parse("https://example.com/bearer").unwrap(),
            headers: http::HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn bearer_only_for_authorized_endpoints() {
        let auth = BearerAuth::new("t0");
        let req = auth.will_request(built(), &Secured(true)).await.unwrap();
        assert_eq!(req.headers.get(AUTHORIZATION).unwrap(), "Bearer t0");
        assert!(req.headers.get(AUTHORIZATION).unwrap().is_sensitive());

        let req = auth.will_request(built(), &Secured(false)).await.unwrap();
        assert!(req.headers.get(AUTHORIZATION).is_none());

        auth.set_token("t1");
        let req = auth.will_request(built(), &Secured(true)).await.unwrap();
        assert_eq!(req.headers.get(AUTHORIZATION).unwrap(), "Bearer t1");
    }

    #[tokio::test]
    async fn invalid_token_rejects() {
        let auth = BearerAuth::new("bad\ntoken");
        let err = auth.will_request(built(), &Secured(true)).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
    }

    #[tokio::test]
    async fn default_delegate_passes_through() {
        let req = NoDelegate.will_request(built(), &Secured(true)).await.unwrap();
        assert_eq!(req.url.path(), "/bearer");
    }
}
