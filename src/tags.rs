//! Per-handler contextual logging tags.
//!
//! [`LogContext`] is a tag map owned by a single handler invocation,
//! seeded with the request's correlation id under
//! [`REQUEST_ID_TAG`]. Handlers take it as an extractor argument, so it
//! is constructed from the request extensions before handler logic runs,
//! and accumulate tags with [`LogContext::add_tag`] as the request
//! progresses. Empty values are dropped rather than stored.
//!
//! Emit the accumulated tags as a structured field:
//!
//! ```ignore
//! async fn handler(mut ctx: LogContext) -> Json<Status> {
//!     ctx.add_tag("customer", customer_id);
//!     tracing::info!(tags = %ctx, "processing get request");
//!     // ...
//! }
//! ```

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::context::{CorrelationId, MISSING_ID};

/// Tag name the correlation id is seeded under.
pub const REQUEST_ID_TAG: &str = "divak_request_id";

/// Conversion accepted by [`LogContext::add_tag`]. `None` and empty
/// strings both mean "no value".
pub trait IntoTagValue {
    fn into_tag_value(self) -> Option<String>;
}

impl IntoTagValue for String {
    fn into_tag_value(self) -> Option<String> {
        Some(self)
    }
}

impl IntoTagValue for &str {
    fn into_tag_value(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl<T: IntoTagValue> IntoTagValue for Option<T> {
    fn into_tag_value(self) -> Option<String> {
        self.and_then(IntoTagValue::into_tag_value)
    }
}

/// Mutable tag mapping for one request-handler invocation.
///
/// Request handling is sequential within a request, so the map needs no
/// locking; the context is never shared across requests.
#[derive(Debug, Clone)]
pub struct LogContext {
    tags: BTreeMap<String, String>,
}

impl LogContext {
    /// Seed a context with the correlation id (or the `-` placeholder).
    #[must_use]
    pub fn new(correlation_id: Option<&str>) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(
            REQUEST_ID_TAG.to_string(),
            correlation_id.unwrap_or(MISSING_ID).to_string(),
        );
        Self { tags }
    }

    /// Store `value` under `name`. A `None` or empty value is a no-op;
    /// anything else overwrites. Tags accumulate for the remainder of
    /// the request's handling.
    pub fn add_tag(&mut self, name: impl Into<String>, value: impl IntoTagValue) {
        let Some(value) = value.into_tag_value() else {
            return;
        };
        if value.is_empty() {
            return;
        }
        self.tags.insert(name.into(), value);
    }

    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        self.tags
            .get(REQUEST_ID_TAG)
            .map_or(MISSING_ID, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for LogContext {
    /// Renders `name=value` pairs in name order.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (name, value)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl<S> FromRequestParts<S> for LogContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<CorrelationId>()
            .and_then(CorrelationId::value)
            .map(std::borrow::Cow::into_owned);
        Ok(Self::new(id.as_deref()))
    }
}
