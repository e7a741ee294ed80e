//! Divak is request-tracing middleware for axum services.
//!
//! It assigns or propagates a correlation identifier across each
//! incoming request and its response, and makes that identifier
//! available to every log statement emitted while the request is being
//! handled — including statements from third-party crates that know
//! nothing about divak.
//!
//! # Architecture
//!
//! - [`access`] -- Per-request access logging with status-derived severity.
//! - [`context`] -- Typed [`CorrelationId`](context::CorrelationId) request
//!   extension and the ambient task-local id scope.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`id`] -- Correlation id resolution: configurable header, pluggable
//!   generator, UUID default.
//! - [`logging`] -- Idempotent `tracing` setup with JSON and
//!   request-id-stamping text output.
//! - [`recorder`] -- [`Recorder`](recorder::Recorder) application wrapper
//!   plus the [`Propagator`](recorder::Propagator) and
//!   [`Reporter`](recorder::Reporter) extension points.
//! - [`relay`] -- Tower layers attaching the id to each request and
//!   injecting it into each response exactly once.
//! - [`tags`] -- [`LogContext`](tags::LogContext) per-handler tag
//!   accumulator, seeded with the correlation id.
//!
//! # Quick start
//!
//! ```ignore
//! let mut recorder = divak::Recorder::new(router);
//! recorder.set_service("my-service");
//! recorder.add_propagator(divak::RequestIdPropagator::new());
//! let app = recorder.into_router();
//! ```

pub mod access;
pub mod context;
pub mod error;
pub mod id;
pub mod logging;
pub mod recorder;
pub mod relay;
pub mod tags;

pub use context::CorrelationId;
pub use error::DivakError;
pub use id::RequestIdSource;
pub use recorder::{Observation, Propagator, Recorder, Reporter, RequestIdPropagator};
pub use tags::LogContext;
