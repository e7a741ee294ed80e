//! Tower middleware relaying a correlation id from request to response.
//!
//! [`HeaderRelayLayer`] wraps a service so that every request is
//! processed as: resolve the id from the inbound headers (or generate
//! one), attach it to the request extensions, run the inner service
//! inside the ambient id scope and a `divak_request_id` span, then write
//! the id into the response headers exactly once — before any body byte
//! reaches the wire, since the response head flushes with the first body
//! frame. Error responses take the same path, so 4xx/5xx responses carry
//! the header too.
//!
//! [`EnsureCorrelationIdLayer`] is the unconditional attachment step the
//! application installs outside all propagators: it guarantees a
//! [`CorrelationId`] extension and an ambient scope exist before any
//! handler code observes the request, even when no propagator is
//! configured.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue, Request, Response};
use tower::{Layer, Service};
use tracing::Instrument;

use crate::context::{self, CorrelationId};
use crate::id::RequestIdSource;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Layer producing [`HeaderRelayService`].
#[derive(Debug, Clone, Default)]
pub struct HeaderRelayLayer {
    source: RequestIdSource,
}

impl HeaderRelayLayer {
    #[must_use]
    pub fn new(source: RequestIdSource) -> Self {
        Self { source }
    }
}

impl<S> Layer<S> for HeaderRelayLayer {
    type Service = HeaderRelayService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HeaderRelayService {
            inner,
            source: self.source.clone(),
        }
    }
}

/// Per-application service; per-request state lives in the returned
/// future, never shared across requests.
#[derive(Debug, Clone)]
pub struct HeaderRelayService<S> {
    inner: S,
    source: RequestIdSource,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HeaderRelayService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Take the ready service, leave the clone for the next request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        // An id already attached by an earlier layer is kept verbatim;
        // otherwise resolve from the inbound headers.
        let id = match req
            .extensions()
            .get::<CorrelationId>()
            .and_then(|c| c.header_value().cloned())
        {
            Some(existing) => Some(existing),
            None => self.source.resolve(req.headers()),
        };
        req.extensions_mut().insert(CorrelationId::new(id.clone()));

        // The wire value relays byte for byte; logging sees it decoded
        // lossily.
        let display_id = id
            .as_ref()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        let header_name = self.source.header_name().clone();
        Box::pin(async move {
            let span = tracing::info_span!(
                "request",
                divak_request_id = %display_id.as_deref().unwrap_or(context::MISSING_ID),
            );
            let mut response =
                context::with_request_id(display_id, inner.call(req).instrument(span)).await?;

            inject_header(&header_name, id.as_ref(), response.headers_mut());
            // Hand the id to outer layers (access log) by value; nothing
            // retains the request past this point.
            response.extensions_mut().insert(CorrelationId::new(id));
            Ok(response)
        })
    }
}

/// Write `id` under `name` unless the handler already set the header.
fn inject_header(
    name: &HeaderName,
    id: Option<&HeaderValue>,
    headers: &mut axum::http::HeaderMap,
) {
    let Some(id) = id else { return };
    if headers.contains_key(name) {
        return;
    }
    headers.insert(name.clone(), id.clone());
}

/// Layer producing [`EnsureCorrelationIdService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureCorrelationIdLayer;

impl<S> Layer<S> for EnsureCorrelationIdLayer {
    type Service = EnsureCorrelationIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EnsureCorrelationIdService { inner }
    }
}

/// Guarantees a [`CorrelationId`] extension and an ambient scope for
/// every request, preserving any value set earlier.
#[derive(Debug, Clone)]
pub struct EnsureCorrelationIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for EnsureCorrelationIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let id = match req.extensions().get::<CorrelationId>() {
            Some(existing) => existing.value().map(std::borrow::Cow::into_owned),
            None => {
                req.extensions_mut().insert(CorrelationId::new(None));
                None
            }
        };
        Box::pin(context::with_request_id(id, async move {
            inner.call(req).await
        }))
    }
}
