//! Correlation id resolution.
//!
//! [`RequestIdSource`] decides the correlation id for an incoming
//! request: reuse the configured header's value when present, otherwise
//! synthesize one with the configured [`IdGenerator`]. Generation can be
//! disabled entirely, in which case header-less requests get no id at
//! all (a true absence, never an empty string).

use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::DivakError;

/// Default header carrying the correlation id, on both request and
/// response.
pub const DEFAULT_HEADER_NAME: &str = "Request-Id";

/// Zero-argument callable producing a new unique identifier value.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// The default generator: a random 128-bit UUID rendered as text.
#[must_use]
pub fn uuid_generator() -> IdGenerator {
    Arc::new(|| uuid::Uuid::new_v4().to_string())
}

/// Configuration for resolving a request's correlation id.
#[derive(Clone)]
pub struct RequestIdSource {
    header_name: HeaderName,
    generator: Option<IdGenerator>,
}

impl std::fmt::Debug for RequestIdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestIdSource")
            .field("header_name", &self.header_name)
            .field("generator", &self.generator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Default for RequestIdSource {
    fn default() -> Self {
        Self {
            header_name: HeaderName::from_static("request-id"),
            generator: Some(uuid_generator()),
        }
    }
}

impl RequestIdSource {
    /// Build a source reading `header_name` with the default UUID
    /// generator.
    ///
    /// Malformed header names fail here, at setup time, not per-request.
    pub fn new(header_name: &str) -> Result<Self, DivakError> {
        let header_name = header_name.parse::<HeaderName>().map_err(|source| {
            DivakError::InvalidHeaderName {
                name: header_name.to_string(),
                source,
            }
        })?;
        Ok(Self {
            header_name,
            generator: Some(uuid_generator()),
        })
    }

    /// Replace the generator.
    #[must_use]
    pub fn with_generator(mut self, generator: IdGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Disable generation: requests without the header resolve to no id.
    #[must_use]
    pub fn without_generator(mut self) -> Self {
        self.generator = None;
        self
    }

    #[must_use]
    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Resolve the correlation id for a request's headers.
    ///
    /// Header lookup is case-insensitive per the `HeaderMap` contract.
    /// An inbound value is returned verbatim, raw bytes included —
    /// legal HTTP obs-text need not be UTF-8. Generator panics
    /// propagate: a broken generator is a setup bug, not a per-request
    /// condition. A generator emitting something that is not a legal
    /// header value resolves to no id, with a warning.
    #[must_use]
    pub fn resolve(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        if let Some(value) = headers.get(&self.header_name) {
            return Some(value.clone());
        }
        let generated = self.generator.as_ref().map(|generate| generate())?;
        match HeaderValue::from_str(&generated) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(
                    header = %self.header_name,
                    "generated id is not a valid header value, dropping"
                );
                None
            }
        }
    }
}
