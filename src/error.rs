//! Engine error taxonomy and its HTTP mapping.
//!
//! `MalformedOracleResponse` is produced by oracle payload parsers but is
//! absorbed inside the cycle (the field degrades to its absent value), so the
//! HTTP layer normally only sees the other kinds.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domain::CefrLevel;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("no level data for category '{category}' at band {band}")]
  MissingLevelData { category: String, band: CefrLevel },

  #[error("oracle unavailable: {0}")]
  OracleUnavailable(String),

  #[error("malformed oracle response: {0}")]
  MalformedOracleResponse(String),

  #[error("invalid session state: {0}")]
  InvalidSessionState(String),
}

impl EngineError {
  pub fn kind(&self) -> &'static str {
    match self {
      EngineError::Configuration(_) => "configuration",
      EngineError::MissingLevelData { .. } => "missing_level_data",
      EngineError::OracleUnavailable(_) => "oracle_unavailable",
      EngineError::MalformedOracleResponse(_) => "malformed_oracle_response",
      EngineError::InvalidSessionState(_) => "invalid_session_state",
    }
  }

  /// Only transport-level oracle failures are worth retrying as-is.
  pub fn is_retryable(&self) -> bool {
    matches!(self, EngineError::OracleUnavailable(_))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      EngineError::InvalidSessionState(_) => StatusCode::BAD_REQUEST,
      EngineError::OracleUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      EngineError::MalformedOracleResponse(_) => StatusCode::BAD_GATEWAY,
      EngineError::Configuration(_) | EngineError::MissingLevelData { .. } => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

#[derive(Serialize)]
struct ErrorOut {
  error: String,
  kind: &'static str,
  retryable: bool,
}

impl IntoResponse for EngineError {
  fn into_response(self) -> Response {
    let body = ErrorOut {
      error: self.to_string(),
      kind: self.kind(),
      retryable: self.is_retryable(),
    };
    (self.status(), Json(body)).into_response()
  }
}
