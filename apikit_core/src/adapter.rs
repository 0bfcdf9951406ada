use crate::codec::json::Json;
use crate::codec::{ContentType, format_for_content_type};
use crate::debug::{DebugLevel, DebugSink, NoopDebugSink};
use crate::delegate::{AdapterDelegate, NoDelegate};
use crate::endpoint::{Endpoint, ResponseEndpoint};
use crate::error::{ApiError, ApiResult, FxError, StandardError};
use crate::policy::Policy;
use crate::request::build_request;
use crate::response::{
    CustomError, CustomErrorDecoder, ErrorContext, ErrorDecoder, ErrorDecoders, RawResponse,
    classify_response, classify_transport_error, decode_json,
};
#[cfg(feature = "reqwest")]
use crate::transport::ReqwestTransport;
use crate::transport::{BuiltRequest, RequestBody, Transport, TransportBody, TransportError};
use bytes::{Bytes, BytesMut};
use core::time::Duration;
use futures_util::future::{AbortHandle, Abortable};
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

const MAX_DEBUG_CHARS: usize = 32 * 1024;
const MAX_BODY_PREALLOC: usize = 1024 * 1024;

/// Executes endpoints against one base URL.
///
/// Cloning is cheap when the transport is; clones share the delegate, the
/// error decoders and the running-request counter.
#[derive(Clone)]
pub struct ApiAdapter<T: Transport> {
    base_url: Url,
    transport: T,
    policy: Policy,
    error_decoders: ErrorDecoders,
    delegate: Arc<dyn AdapterDelegate>,
    debug_level: DebugLevel,
    debug_sink: Arc<dyn DebugSink>,
    running: Arc<RunningRequests>,
}

/// Cancels the request it was handed out for. Cancelling after the request
/// finished has no effect.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    abort: AbortHandle,
}

impl TaskHandle {
    #[inline]
    pub fn cancel(&self) {
        self.abort.abort();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }
}

#[cfg(feature = "reqwest")]
impl ApiAdapter<ReqwestTransport> {
    pub fn new(base_url: Url) -> Self {
        Self::with_reqwest_client(base_url, reqwest::Client::new())
    }

    pub fn with_reqwest_client(base_url: Url, client: reqwest::Client) -> Self {
        Self::with_transport(base_url, ReqwestTransport::new(client))
    }
}

impl<T: Transport> ApiAdapter<T> {
    pub fn with_transport(base_url: Url, transport: T) -> Self {
        Self {
            base_url,
            transport,
            policy: Policy::new(),
            error_decoders: Vec::new(),
            delegate: Arc::new(NoDelegate),
            debug_level: DebugLevel::default(),
            debug_sink: Arc::new(NoopDebugSink),
            running: Arc::new(RunningRequests::default()),
        }
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    #[inline]
    pub fn policy_mut(&mut self) -> &mut Policy {
        &mut self.policy
    }

    #[inline]
    pub fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }

    #[inline]
    pub fn set_debug_level(&mut self, level: DebugLevel) {
        self.debug_level = level;
    }

    #[inline]
    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    pub fn with_debug_sink(mut self, sink: impl DebugSink) -> Self {
        self.debug_sink = Arc::new(sink);
        self
    }

    pub fn with_delegate(self, delegate: impl AdapterDelegate) -> Self {
        self.with_shared_delegate(Arc::new(delegate))
    }

    /// Like [`Self::with_delegate`], for callers that keep their own handle
    /// (e.g. to rotate a [`crate::delegate::BearerAuth`] token).
    pub fn with_shared_delegate(mut self, delegate: Arc<dyn AdapterDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn AdapterDelegate>) {
        self.delegate = delegate;
    }

    /// Appends `C` to the custom error chain.
    pub fn with_error_type<C: CustomError>(self) -> Self {
        self.with_error_decoder(CustomErrorDecoder::<C>::default())
    }

    /// Appends a decoder to the custom error chain. Decoders run in the order
    /// they were added; the first one returning `Some` wins.
    pub fn with_error_decoder(mut self, decoder: impl ErrorDecoder) -> Self {
        self.error_decoders.push(Arc::new(decoder));
        self
    }

    pub fn with_error_fn<F>(self, f: F) -> Self
    where
        F: Fn(&ErrorContext<'_>) -> Option<FxError> + Send + Sync + 'static,
    {
        self.with_error_decoder(f)
    }

    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.policy.insert_header(name, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.policy.set_timeout(timeout);
        self
    }

    /// Requests currently between dispatch and completion.
    #[inline]
    pub fn running_request_count(&self) -> u64 {
        self.running.get()
    }

    /// The request `ep` would send, before the delegate sees it.
    pub async fn build_request<E: Endpoint>(&self, ep: &E) -> ApiResult<BuiltRequest> {
        build_request(&self.base_url, &self.policy, ep, None).await
    }

    /// Status-only call; any non-error status, including an empty 204, is `Ok`.
    pub async fn request<E: Endpoint>(&self, ep: &E) -> ApiResult<()> {
        self.execute(ep, None, None::<fn(TaskHandle)>).await.map(|_| ())
    }

    /// Raw body of a successful response.
    pub async fn request_data<E: Endpoint>(&self, ep: &E) -> ApiResult<Bytes> {
        self.execute(ep, None, None::<fn(TaskHandle)>)
            .await
            .map(|r| r.body)
    }

    /// Status, headers and body of a successful response.
    pub async fn request_raw<E: Endpoint>(&self, ep: &E) -> ApiResult<RawResponse> {
        self.execute(ep, None, None::<fn(TaskHandle)>).await
    }

    pub async fn request_response<E: ResponseEndpoint>(&self, ep: &E) -> ApiResult<E::Response> {
        self.response_inner(ep, None::<fn(TaskHandle)>).await
    }

    /// [`Self::request_data`], handing a [`TaskHandle`] to `on_create` once
    /// the request is dispatched.
    pub async fn data_task<E, F>(&self, ep: &E, on_create: F) -> ApiResult<Bytes>
    where
        E: Endpoint,
        F: FnOnce(TaskHandle),
    {
        self.execute(ep, None, Some(on_create))
            .await
            .map(|r| r.body)
    }

    /// [`Self::request_response`], handing a [`TaskHandle`] to `on_create`
    /// once the request is dispatched.
    pub async fn response_task<E, F>(&self, ep: &E, on_create: F) -> ApiResult<E::Response>
    where
        E: ResponseEndpoint,
        F: FnOnce(TaskHandle),
    {
        self.response_inner(ep, Some(on_create)).await
    }

    async fn response_inner<E, F>(&self, ep: &E, on_create: Option<F>) -> ApiResult<E::Response>
    where
        E: ResponseEndpoint,
        F: FnOnce(TaskHandle),
    {
        let raw = self
            .execute(ep, Some(<Json as ContentType>::CONTENT_TYPE), on_create)
            .await?;
        decode_json::<E::Response>(&raw).inspect_err(|e| {
            let dbg = ep.debug_level().unwrap_or(self.debug_level);
            if dbg.is_verbose() {
                self.debug_sink.failure(dbg, &ep.path(), e);
            }
        })
    }

    async fn execute<E, F>(
        &self,
        ep: &E,
        accept: Option<&'static str>,
        on_create: Option<F>,
    ) -> ApiResult<RawResponse>
    where
        E: Endpoint,
        F: FnOnce(TaskHandle),
    {
        let dbg = ep.debug_level().unwrap_or(self.debug_level);
        let sink = &*self.debug_sink;
        let fail = |url: &str, e: ApiError| {
            if dbg.is_verbose() {
                sink.failure(dbg, url, &e);
            }
            e
        };

        // 1) Build, then let the delegate adapt or reject.
        let built = build_request(&self.base_url, &self.policy, ep, accept)
            .await
            .map_err(|e| fail(&*ep.path(), e))?;
        let url = built.url.to_string();
        let built = self
            .delegate
            .will_request(built, ep)
            .await
            .map_err(|e| fail(&url, e))?;
        let url = built.url.to_string();
        let endpoint = built.meta.endpoint;

        if dbg.is_verbose() {
            sink.request_start(dbg, &built.meta.method, &url, endpoint);
        }
        if dbg.is_very_verbose() {
            sink.request_headers(dbg, &built.headers);
            if let Some(body) = built.body.as_ref().and_then(RequestBody::as_bytes) {
                let format = format_for_content_type(content_type(&built.headers));
                sink.request_body(dbg, body, format, MAX_DEBUG_CHARS);
            }
        }

        // 2) Dispatch.
        let running = RunningGuard::start(&self.running, &*self.delegate, sink, dbg);
        let (abort, registration) = AbortHandle::new_pair();
        let send = self.transport.send(built);
        let exchange = Abortable::new(
            async move {
                let mut resp = send.await?;
                let body = read_body_all(resp.body.as_mut(), resp.content_length).await?;
                Ok::<_, TransportError>(RawResponse {
                    status: resp.status,
                    headers: resp.headers,
                    body,
                })
            },
            registration,
        );
        if let Some(on_create) = on_create {
            on_create(TaskHandle { abort });
        }
        let outcome = exchange.await;
        drop(running);

        // 3) Classify.
        let raw = match outcome {
            Err(_aborted) => return Err(fail(&url, StandardError::Cancelled.into())),
            Ok(Err(e)) => {
                let err = classify_transport_error(endpoint, e, &self.error_decoders);
                return Err(fail(&url, err));
            }
            Ok(Ok(raw)) => raw,
        };

        let ok = !(raw.status.is_client_error() || raw.status.is_server_error());
        if dbg.is_verbose() {
            sink.response_status(dbg, raw.status, &url, ok);
        }
        if dbg.is_very_verbose() {
            sink.response_headers(dbg, &raw.headers);
            if ok {
                let format = format_for_content_type(content_type(&raw.headers));
                sink.response_body(dbg, &raw.body, format, MAX_DEBUG_CHARS);
            } else {
                sink.response_body_preview(dbg, &raw.headers, &raw.body, Some(raw.body.len()));
            }
        }

        classify_response(endpoint, raw, &self.error_decoders)
    }
}

/// In-flight request count.
///
/// Every change and its notification happen under `order`, so observers see
/// the values in the order the counter took them. Reads skip the lock.
#[derive(Debug, Default)]
struct RunningRequests {
    count: AtomicU64,
    order: Mutex<()>,
}

impl RunningRequests {
    #[inline]
    fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn update(&self, step: impl FnOnce(u64) -> Option<u64>, notify: impl FnOnce(u64)) {
        let _order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = step(self.count.load(Ordering::Acquire)) {
            self.count.store(next, Ordering::Release);
            notify(next);
        }
    }
}

/// Counts one in-flight request for as long as it lives.
struct RunningGuard<'a> {
    running: &'a RunningRequests,
    delegate: &'a dyn AdapterDelegate,
    sink: &'a dyn DebugSink,
    dbg: DebugLevel,
}

impl<'a> RunningGuard<'a> {
    fn start(
        running: &'a RunningRequests,
        delegate: &'a dyn AdapterDelegate,
        sink: &'a dyn DebugSink,
        dbg: DebugLevel,
    ) -> Self {
        let guard = Self {
            running,
            delegate,
            sink,
            dbg,
        };
        running.update(|n| n.checked_add(1), |now| guard.notify(now));
        guard
    }

    fn notify(&self, now: u64) {
        self.delegate.did_update_running_request_count(now);
        if self.dbg.is_verbose() {
            self.sink.running_requests(self.dbg, now);
        }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running
            .update(|n| n.checked_sub(1), |now| self.notify(now));
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Sized from the declared length, within reason.
fn body_buffer(content_length: Option<u64>) -> BytesMut {
    let hint = content_length
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(8 * 1024);
    BytesMut::with_capacity(hint.min(MAX_BODY_PREALLOC))
}

async fn read_body_all(
    body: &mut dyn TransportBody,
    content_length: Option<u64>,
) -> Result<Bytes, TransportError> {
    let mut buf = body_buffer(content_length);
    while let Some(chunk) = body.next_chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
