//! Converso · adaptive language-practice chat backend
//!
//! - Axum HTTP API consumed by the mobile client
//! - OpenAI chat completions for replies and turn scoring
//! - Per-session Elo-style rating with CEFR-banded prompts
//!
//! Important env variables:
//!   PORT                : u16 (default 5001)
//!   DATA_DIR            : reference data directory (default "./data")
//!   DEFAULT_LANGUAGE    : target language when set-up omits it (default "Spanish")
//!   NATIVE_LANGUAGE     : learner's native language (default "English")
//!   DEFAULT_RATING      : rating when set-up omits it (default 300)
//!   OPENAI_API_KEY      : required
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL : default "gpt-4o"
//!   OPENAI_TIMEOUT_SECS : request timeout (default 20)
//!   DIFFICULTY_SEED     : u64, makes difficulty sampling reproducible
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts + engine tuning)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod difficulty;
mod vocab;
mod lessons;
mod oracle;
mod openai;
mod prompt;
mod scoring;
mod session;
mod registry;
mod state;
mod protocol;
mod routes;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: session registry, language catalog, OpenAI-backed engine.
  let state = Arc::new(AppState::from_env()?);
  let addr = SocketAddr::from(([0, 0, 0, 0], state.server.port));

  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "converso_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "converso_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!(target: "converso_backend", "Shutdown signal received"),
    Err(e) => warn!(target: "converso_backend", error = %e, "Cannot listen for shutdown signal"),
  }
}
