//! Per-request correlation id attachment and ambient lookup.
//!
//! Two cooperating mechanisms:
//!
//! - [`CorrelationId`] is a typed request/response extension carrying the
//!   resolved id for the request's lifetime. Once set with a value it is
//!   never overwritten ([`CorrelationId::ensure`]).
//! - A tokio task-local scope ([`with_request_id`]) makes the id readable
//!   from anywhere on the request's task via [`current_request_id`],
//!   without threading it through every signature. Code running outside
//!   any request sees the `-` placeholder — the lookup never fails.

use std::borrow::Cow;
use std::future::Future;

use http::HeaderValue;

/// Placeholder used wherever no correlation id is available.
pub const MISSING_ID: &str = "-";

/// Correlation id attached to a request (and mirrored onto its response)
/// as a typed extension.
///
/// The inner value is optional: a request processed with generation
/// disabled and no inbound header carries `CorrelationId(None)` — the id
/// is known to be absent, which is distinct from the extension never
/// having been attached. The value is kept as the raw [`HeaderValue`] so
/// an inbound id round-trips byte for byte; display accessors decode
/// lossily for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(Option<HeaderValue>);

impl CorrelationId {
    #[must_use]
    pub fn new(value: Option<HeaderValue>) -> Self {
        Self(value)
    }

    /// The verbatim wire value, for header injection.
    #[must_use]
    pub fn header_value(&self) -> Option<&HeaderValue> {
        self.0.as_ref()
    }

    /// The id as text for logging, decoded lossily.
    #[must_use]
    pub fn value(&self) -> Option<Cow<'_, str>> {
        self.0
            .as_ref()
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
    }

    /// The id as text, or the `-` placeholder when absent.
    #[must_use]
    pub fn value_or_missing(&self) -> Cow<'_, str> {
        self.value().unwrap_or(Cow::Borrowed(MISSING_ID))
    }

    /// Keep an existing id, fill in an absent one.
    ///
    /// Upholds the set-at-most-once invariant: callers that find a value
    /// already attached must not replace it.
    pub fn ensure(&mut self, value: Option<HeaderValue>) {
        if self.0.is_none() {
            self.0 = value;
        }
    }
}

tokio::task_local! {
    static REQUEST_ID: Option<String>;
}

/// Run `fut` with `id` as the ambient correlation id for the task.
pub async fn with_request_id<F, T>(id: Option<String>, fut: F) -> T
where
    F: Future<Output = T>,
{
    REQUEST_ID.scope(id, fut).await
}

/// Run `f` with `id` as the ambient correlation id, synchronously.
///
/// Used where a value is known outside the request's scope, e.g. the
/// access-log stage reading the id back off the response.
pub fn with_request_id_sync<F, T>(id: Option<String>, f: F) -> T
where
    F: FnOnce() -> T,
{
    REQUEST_ID.sync_scope(id, f)
}

/// The ambient correlation id, if a request is active and has one.
#[must_use]
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok().flatten()
}

/// The ambient correlation id, or `-` outside any request scope.
#[must_use]
pub fn request_id_or_missing() -> String {
    current_request_id().unwrap_or_else(|| MISSING_ID.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_outside_any_scope() {
        assert_eq!(current_request_id(), None);
        assert_eq!(request_id_or_missing(), "-");
    }

    #[tokio::test]
    async fn ambient_id_visible_within_scope() {
        let seen = with_request_id(Some("abc-123".into()), async {
            request_id_or_missing()
        })
        .await;
        assert_eq!(seen, "abc-123");
        assert_eq!(current_request_id(), None);
    }

    #[tokio::test]
    async fn scope_with_no_id_reads_as_missing() {
        let seen = with_request_id(None, async { request_id_or_missing() }).await;
        assert_eq!(seen, "-");
    }

    #[tokio::test]
    async fn concurrent_scopes_do_not_leak() {
        let (a, b) = tokio::join!(
            with_request_id(Some("req-a".into()), async {
                tokio::task::yield_now().await;
                request_id_or_missing()
            }),
            with_request_id(Some("req-b".into()), async {
                tokio::task::yield_now().await;
                request_id_or_missing()
            }),
        );
        assert_eq!(a, "req-a");
        assert_eq!(b, "req-b");
    }

    #[test]
    fn sync_scope_sets_ambient_id() {
        let seen = with_request_id_sync(Some("sync-id".into()), request_id_or_missing);
        assert_eq!(seen, "sync-id");
        assert_eq!(current_request_id(), None);
    }

    #[test]
    fn ensure_fills_absence_only() {
        let mut id = CorrelationId::new(None);
        id.ensure(Some(HeaderValue::from_static("first")));
        assert_eq!(id.value().as_deref(), Some("first"));

        id.ensure(Some(HeaderValue::from_static("second")));
        assert_eq!(id.value().as_deref(), Some("first"));
    }

    #[test]
    fn value_or_missing_placeholder() {
        assert_eq!(CorrelationId::new(None).value_or_missing(), "-");
        assert_eq!(
            CorrelationId::new(Some(HeaderValue::from_static("x"))).value_or_missing(),
            "x"
        );
    }

    #[test]
    fn non_utf8_value_decodes_lossily_for_display() {
        let id = CorrelationId::new(Some(HeaderValue::from_bytes(&[0x66, 0xFF]).unwrap()));
        assert_eq!(id.value_or_missing(), "f\u{FFFD}");
        assert_eq!(id.header_value().unwrap().as_bytes(), &[0x66, 0xFF]);
    }
}
