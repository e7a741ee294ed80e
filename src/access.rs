//! Per-request access logging.
//!
//! [`AccessLogLayer`] sits outermost on the router and emits exactly one
//! line per completed request:
//!
//! ```text
//! <remote> "<method> <uri>" <status> "<user-agent>" <elapsed:.6>
//! ```
//!
//! Severity follows the response status: below 400 logs at info, 400–499
//! at warn, 500 and above at error. The correlation id is attached as a
//! structured field (taken from the response extensions the relay set),
//! never interpolated into the message. The layer observes only — it
//! never mutates the response and never fails the request.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use tower::{Layer, Service};

use crate::context::{self, CorrelationId, MISSING_ID};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Layer producing [`AccessLogService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogLayer;

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct AccessLogService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AccessLogService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let remote = req
            .extensions()
            .get::<ConnectInfo<std::net::SocketAddr>>()
            .map_or_else(|| MISSING_ID.to_string(), |info| info.0.ip().to_string());
        let method = req.method().clone();
        let uri = req.uri().clone();
        let user_agent = req
            .headers()
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(MISSING_ID)
            .to_string();
        let started = Instant::now();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let id = response
                .extensions()
                .get::<CorrelationId>()
                .map(|c| c.value_or_missing().to_string())
                .unwrap_or_else(context::request_id_or_missing);
            // Re-enter the request's ambient scope so the formatter
            // stamps this line with the same id as the handler's output.
            context::with_request_id_sync(Some(id.clone()), || {
                emit(&AccessRecord {
                    remote: &remote,
                    method: method.as_str(),
                    uri: &uri.to_string(),
                    status: response.status(),
                    user_agent: &user_agent,
                    elapsed: started.elapsed().as_secs_f64(),
                    request_id: &id,
                });
            });
            Ok(response)
        })
    }
}

struct AccessRecord<'a> {
    remote: &'a str,
    method: &'a str,
    uri: &'a str,
    status: StatusCode,
    user_agent: &'a str,
    elapsed: f64,
    request_id: &'a str,
}

/// Severity for a completed response.
#[must_use]
pub fn severity_for(status: StatusCode) -> tracing::Level {
    if status.as_u16() >= 500 {
        tracing::Level::ERROR
    } else if status.as_u16() >= 400 {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    }
}

// One call site per severity is unavoidable (tracing levels are static),
// but the field list lives here exactly once.
macro_rules! access_event {
    ($level:ident, $record:expr, $message:expr) => {
        tracing::$level!(
            target: "divak::access",
            divak_request_id = %$record.request_id,
            status = $record.status.as_u16(),
            "{}", $message
        )
    };
}

fn emit(record: &AccessRecord<'_>) {
    let message = format!(
        "{} \"{} {}\" {} \"{}\" {:.6}",
        record.remote,
        record.method,
        record.uri,
        record.status.as_u16(),
        record.user_agent,
        record.elapsed,
    );
    let level = severity_for(record.status);
    if level == tracing::Level::ERROR {
        access_event!(error, record, message);
    } else if level == tracing::Level::WARN {
        access_event!(warn, record, message);
    } else {
        access_event!(info, record, message);
    }
}
