//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,converso_backend=debug,session=debug,tower_http=info,axum=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Log targets: converso_backend (startup, reference data), session (message
//! cycles), scoring (per-turn signals), oracle (OpenAI calls, malformed
//! payloads), lessons (recommendations). Tower HTTP TraceLayer adds the
//! per-request spans.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,converso_backend=debug,session=debug,scoring=debug,oracle=info,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
        EnvFilter::new(DEFAULT_FILTER)
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().flatten_event(true).init();
        }
        _ => {
            builder.init();
        }
    }
}
