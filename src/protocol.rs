//! Public protocol structs for the HTTP endpoints (serde ready).
//! Field names follow the existing mobile client's JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::CefrLevel;
use crate::scoring::TurnScore;
use crate::session::SessionPhase;

#[derive(Debug, Deserialize)]
pub struct SetUpChatIn {
    pub conversation_topic: String,
    #[serde(default)]
    pub users_rating: Option<i64>,
    #[serde(default)]
    pub language: Option<String>,
}

/// `messages`, `conversation_topic` and `users_rating` are accepted for
/// compatibility; the session's own state is authoritative.
#[derive(Debug, Deserialize)]
pub struct GenerateResponseIn {
    pub input: String,
    #[serde(default)]
    pub messages: Option<serde_json::Value>,
    #[serde(default)]
    pub conversation_topic: Option<String>,
    #[serde(default)]
    pub users_rating: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponseOut {
    pub data: String,
    pub users_rating: i32,
    pub was_help_request: bool,
    /// Present when this message answered a previous bot turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<TurnScore>,
}

#[derive(Debug, Serialize)]
pub struct MessageOut {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CheckServerOut {
    pub server: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordMistakesIn {
    #[serde(default)]
    pub mistake_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordMistakesOut {
    pub recommendation: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionStateOut {
    pub phase: SessionPhase,
    pub users_rating: Option<i32>,
    pub cefr_level: CefrLevel,
    pub topic: Option<String>,
    pub language: Option<String>,
    pub message_count: usize,
    pub pending_bot_response: Option<String>,
    /// Non-zero mistake counters, by concept.
    pub lesson_counters: BTreeMap<String, f64>,
}
