//! Shared test application: a `/trace` endpoint that can return any
//! status, fail on demand, and override the relayed header, plus a
//! helper that serves a router on an ephemeral port.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::Query;
use axum::http::{Response, StatusCode};
use axum::routing::get;
use axum::Router;

use divak::{LogContext, Propagator, Recorder};

/// GET `/trace?status=<code>&raise&override_id=<id>`.
///
/// Streams a two-chunk body so the full response pipeline is exercised,
/// mirroring a handler that writes and flushes incrementally. The
/// `raise` parameter aborts with the given status before any body is
/// written; `override_id` sets the `Request-Id` response header from
/// handler code.
pub async fn traced(
    Query(params): Query<HashMap<String, String>>,
    mut ctx: LogContext,
) -> Result<Response<Body>, StatusCode> {
    let status = params
        .get("status")
        .and_then(|s| s.parse::<u16>().ok())
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    ctx.add_tag("endpoint", "trace");
    tracing::debug!(
        tags = %ctx,
        status = status.as_u16(),
        should_raise = params.contains_key("raise"),
        "processing GET"
    );

    if params.contains_key("raise") {
        return Err(status);
    }

    let mut builder = Response::builder().status(status);
    if let Some(override_id) = params.get("override_id") {
        let value = if override_id.is_empty() {
            "my-request-id"
        } else {
            override_id
        };
        builder = builder.header("Request-Id", value);
    }

    let chunks = futures::stream::iter([
        Ok::<_, std::convert::Infallible>(Bytes::from_static(b"chunk one\n")),
        Ok(Bytes::from_static(b"chunk two\n")),
    ]);
    builder
        .body(Body::from_stream(chunks))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build the traced application with one propagator installed.
pub fn build_app(propagator: impl Propagator + 'static) -> Router {
    let mut recorder = Recorder::new(Router::new().route("/trace", get(traced)));
    recorder.set_service("test-application");
    recorder.add_propagator(propagator);
    recorder.into_router()
}

/// Serve `app` on an ephemeral port with oneshot shutdown.
pub async fn spawn(app: Router) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}
