//! Application-level integration and extension points.
//!
//! [`Recorder`] wraps an `axum::Router` and imbues it with request
//! tracing: propagators install per-request layers, reporters receive
//! observations, and [`Recorder::into_router`] finishes the composition
//! with the unconditional correlation-id attachment step and the
//! outermost access-log layer.
//!
//! [`RequestIdPropagator`] is the shipped propagator: it relays the
//! configured header from request to response, generating a value when
//! the request carries none.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::response::IntoResponse;
use axum::routing::Route;
use axum::Router;
use tower::{Layer, Service};

use crate::access::AccessLogLayer;
use crate::error::DivakError;
use crate::id::{IdGenerator, RequestIdSource};
use crate::relay::{EnsureCorrelationIdLayer, HeaderRelayLayer};

/// Inspects requests at setup time and may register per-request hooks.
pub trait Propagator: Send + Sync {
    /// Called once when the propagator is added. Returns whether the
    /// propagator wants to be called again in the future; `false` means
    /// the installed hooks handle everything from here on.
    fn install(&self, recorder: &mut Recorder) -> bool;
}

/// Receives observations for export to a tracing backend.
///
/// Interface only: divak ships no backend. Sampling and trace tracking
/// are future extensions layered on top of this.
pub trait Reporter: Send + Sync {
    fn observe(&self, observation: Observation);
}

/// An opaque observation record handed to reporters.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Observation {
    pub service: Option<String>,
    pub name: String,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Observation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            service: None,
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Imbues an axum application with recording abilities.
#[derive(Default)]
pub struct Recorder {
    router: Router,
    service_name: Option<String>,
    propagators: Vec<Box<dyn Propagator>>,
    reporters: Vec<Box<dyn Reporter>>,
}

impl Recorder {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router,
            service_name: None,
            propagators: Vec::new(),
            reporters: Vec::new(),
        }
    }

    /// Name used when reporting to an observer.
    pub fn set_service(&mut self, name: impl Into<String>) {
        self.service_name = Some(name.into());
    }

    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Add a propagator. Its `install` hook runs immediately; the
    /// propagator is retained only if it asks for future calls.
    pub fn add_propagator(&mut self, propagator: impl Propagator + 'static) {
        let wants_future_calls = propagator.install(self);
        if wants_future_calls {
            self.propagators.push(Box::new(propagator));
        }
    }

    /// Add a reporter to receive observations.
    pub fn add_reporter(&mut self, reporter: impl Reporter + 'static) {
        self.reporters.push(Box::new(reporter));
    }

    /// Fan an observation out to every registered reporter, stamped with
    /// the service name.
    pub fn report(&self, mut observation: Observation) {
        if observation.service.is_none() {
            observation.service = self.service_name.clone();
        }
        for reporter in &self.reporters {
            reporter.observe(observation.clone());
        }
    }

    /// Wrap the router in a per-request layer. Used by propagators from
    /// their `install` hook; layers added first run closest to the
    /// handlers.
    pub fn add_layer<L>(&mut self, layer: L)
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<axum::extract::Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<axum::extract::Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<axum::extract::Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<axum::extract::Request>>::Future: Send + 'static,
    {
        let router = std::mem::take(&mut self.router);
        self.router = router.layer(layer);
    }

    /// Finish composition: every request gets a correlation-id
    /// attachment before any handler code, and the access log observes
    /// the whole pipeline from the outside.
    #[must_use]
    pub fn into_router(mut self) -> Router {
        self.add_layer(EnsureCorrelationIdLayer);
        self.add_layer(AccessLogLayer);
        self.router
    }
}

/// Propagates the correlation header between services.
///
/// Relays the configured request header into the response; when the
/// request carries none, a new value is generated (disable with
/// [`RequestIdPropagator::without_generator`]).
#[derive(Debug, Clone, Default)]
pub struct RequestIdPropagator {
    source: RequestIdSource,
}

impl RequestIdPropagator {
    /// Default `Request-Id` header with UUID generation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different header name. Malformed names fail here, at setup.
    pub fn with_header_name(header_name: &str) -> Result<Self, DivakError> {
        Ok(Self {
            source: RequestIdSource::new(header_name)?,
        })
    }

    #[must_use]
    pub fn with_generator(mut self, generator: IdGenerator) -> Self {
        self.source = self.source.with_generator(generator);
        self
    }

    /// Disable generation of values for requests without the header.
    #[must_use]
    pub fn without_generator(mut self) -> Self {
        self.source = self.source.without_generator();
        self
    }
}

impl Propagator for RequestIdPropagator {
    fn install(&self, recorder: &mut Recorder) -> bool {
        recorder.add_layer(HeaderRelayLayer::new(self.source.clone()));
        // Single invocation; the relay layer handles the rest.
        false
    }
}
