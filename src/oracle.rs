//! External oracle seam: one async call per oracle, final text only.
//!
//! Classifier oracles answer with small JSON objects. The parsers here turn a
//! payload into a typed value or `MalformedOracleResponse`; callers use
//! `or_absent` to degrade a malformed field to its absent value.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::domain::ChatMessage;
use crate::error::EngineError;
use crate::util::trunc_for_log;

pub const HELP_FIELD: &str = "user_asking_for_help";
pub const SCORE_FIELD: &str = "Overall Score";
pub const OFF_LANGUAGE_FIELD: &str = "number_of_english_words";

#[async_trait]
pub trait ChatOracle: Send + Sync {
  /// Conversational reply for the full history under the given instructions.
  async fn reply(
    &self,
    instructions: &str,
    additional_instructions: Option<&str>,
    history: &[ChatMessage],
  ) -> Result<String, EngineError>;

  /// Whether the user is asking for help rather than practicing.
  async fn detect_help(&self, message: &str) -> Result<bool, EngineError>;

  /// Quality of `user_reply` as an answer to `bot_reply`.
  async fn score_response(&self, bot_reply: &str, user_reply: &str) -> Result<f64, EngineError>;

  /// Number of words in `text` that are not in `language`.
  async fn count_off_language_words(&self, text: &str, language: &str) -> Result<usize, EngineError>;
}

/// Degrade a malformed payload to `T::default()`; pass every other error through.
pub fn or_absent<T: Default>(oracle: &str, parsed: Result<T, EngineError>) -> Result<T, EngineError> {
  match parsed {
    Err(EngineError::MalformedOracleResponse(detail)) => {
      warn!(target: "oracle", %oracle, %detail, "Malformed oracle payload; treating signal as absent");
      Ok(T::default())
    }
    other => other,
  }
}

fn field(payload: &str, key: &str) -> Result<Value, EngineError> {
  let v: Value = serde_json::from_str(payload.trim()).map_err(|e| {
    EngineError::MalformedOracleResponse(format!("not JSON ({e}): {}", trunc_for_log(payload, 80)))
  })?;
  v.get(key)
    .cloned()
    .ok_or_else(|| EngineError::MalformedOracleResponse(format!("missing '{key}': {}", trunc_for_log(payload, 80))))
}

pub fn parse_help_flag(payload: &str) -> Result<bool, EngineError> {
  match field(payload, HELP_FIELD)? {
    Value::Bool(b) => Ok(b),
    Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
    Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
      "yes" | "true" | "1" => Ok(true),
      "no" | "false" | "0" => Ok(false),
      other => Err(EngineError::MalformedOracleResponse(format!("help flag '{other}'"))),
    },
    other => Err(EngineError::MalformedOracleResponse(format!("help flag {other}"))),
  }
}

pub fn parse_overall_score(payload: &str) -> Result<f64, EngineError> {
  let score = match field(payload, SCORE_FIELD)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  };
  score
    .filter(|s| s.is_finite())
    .ok_or_else(|| EngineError::MalformedOracleResponse(format!("score in {}", trunc_for_log(payload, 80))))
}

pub fn parse_word_count(payload: &str) -> Result<usize, EngineError> {
  let count = match field(payload, OFF_LANGUAGE_FIELD)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  };
  match count {
    Some(c) if c.is_finite() && c >= 0.0 => Ok(c.floor() as usize),
    _ => Err(EngineError::MalformedOracleResponse(format!("word count in {}", trunc_for_log(payload, 80)))),
  }
}
