//! Minimal traced service.
//!
//! Run with `cargo run --example request_tracing`, then:
//!
//! ```bash
//! curl -i http://127.0.0.1:8000/status
//! curl -i -H 'Request-Id: my-id' http://127.0.0.1:8000/status
//! ```
//!
//! Every response carries a `Request-Id` header and every log line ends
//! with `divak_request_id=<id>`.

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use divak::logging::{self, LogFormat};
use divak::{LogContext, Recorder, RequestIdPropagator};

#[derive(Serialize)]
struct Status {
    service: &'static str,
    version: &'static str,
    status: &'static str,
}

async fn status_handler(mut ctx: LogContext) -> Json<Status> {
    ctx.add_tag("endpoint", "status");
    tracing::info!(tags = %ctx, "processing get request");
    Json(Status {
        service: "my-service",
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
    })
}

#[tokio::main]
async fn main() {
    logging::init(tracing::Level::INFO, LogFormat::Pretty);

    let mut recorder = Recorder::new(Router::new().route("/status", get(status_handler)));
    recorder.set_service("my-service");
    recorder.add_propagator(RequestIdPropagator::new());
    let app = recorder.into_router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8000")
        .await
        .expect("bind 127.0.0.1:8000");
    tracing::info!("listening on http://127.0.0.1:8000");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
