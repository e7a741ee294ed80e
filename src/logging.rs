//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or human-readable output (for TTY / local dev). Format is
//! auto-detected from the terminal but can be forced via
//! [`resolve_format`]'s arguments.
//!
//! Every emitted line carries the ambient correlation id:
//!
//! - Text output uses [`RequestIdFormat`], which stamps
//!   `divak_request_id=<id>` on each event from the task-local request
//!   context — including events from third-party crates that know
//!   nothing about divak, as long as they run on the request's task.
//!   Events outside any request log `divak_request_id=-`.
//! - JSON output carries the id as a field of the per-request span the
//!   relay middleware opens, so it rides as structured metadata rather
//!   than message text.
//!
//! [`init`] is process-wide and idempotent: calling it any number of
//! times configures the subscriber exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Event formatter that appends `divak_request_id=<id-or-dash>` to every
/// line, read from the ambient request context.
///
/// The lookup never fails: records emitted outside any request scope get
/// the `-` placeholder instead of an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdFormat {
    timer: SystemTime,
}

impl<S, N> FormatEvent<S, N> for RequestIdFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        self.timer.format_time(&mut writer)?;
        write!(writer, " {:>5} {}: ", meta.level(), meta.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(
            writer,
            " divak_request_id={}",
            context::request_id_or_missing()
        )
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Safe to call any number of times; only
/// the first call has any effect.
pub fn init(level: tracing::Level, format: LogFormat) {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let filter = tracing_subscriber::filter::Targets::new().with_default(level);

    // try_init rather than init: a foreign subscriber installed first
    // (test harnesses) must not panic the application.
    match format {
        LogFormat::Json => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .try_init();
        }
        LogFormat::Pretty => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().event_format(RequestIdFormat::default()))
                .try_init();
        }
    }
}

/// Whether [`init`] has run at least once in this process.
#[must_use]
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_forces_json() {
        assert_eq!(resolve_format(false, true), LogFormat::Json);
        assert_eq!(resolve_format(true, true), LogFormat::Json);
    }

    #[test]
    fn pretty_flag_forces_pretty() {
        assert_eq!(resolve_format(true, false), LogFormat::Pretty);
    }

    #[test]
    fn repeated_init_is_a_noop() {
        init(tracing::Level::INFO, LogFormat::Json);
        assert!(is_initialized());
        // Second and third installs must neither panic nor reconfigure.
        init(tracing::Level::DEBUG, LogFormat::Pretty);
        init(tracing::Level::ERROR, LogFormat::Json);
        assert!(is_initialized());
    }
}
