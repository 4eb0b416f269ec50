//! HTTP endpoint handlers. These are thin wrappers that forward to the session engine.
//! Each handler is instrumented and logs the session id and basic result info.

use std::{collections::HashSet, sync::Arc};

use axum::{
  extract::State,
  http::HeaderMap,
  response::IntoResponse,
  Json,
};
use tracing::{debug, info, instrument};

use crate::error::EngineError;
use crate::lessons::{recommendation_message, CONCEPTS};
use crate::protocol::*;
use crate::registry::{SessionHandle, DEFAULT_SESSION_ID};
use crate::session::{ChatSetup, Session};
use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-id";

/// Session id from the `x-session-id` header, or the shared default session.
pub fn session_id(headers: &HeaderMap) -> String {
  headers
    .get(SESSION_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .unwrap_or(DEFAULT_SESSION_ID)
    .to_string()
}

#[instrument(level = "info")]
pub async fn http_check_server() -> impl IntoResponse {
  Json(CheckServerOut { server: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into() })
}

#[instrument(level = "info", skip(state, headers, body), fields(session_id = %session_id(&headers), topic = %body.conversation_topic))]
pub async fn http_set_up_chat(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<SetUpChatIn>,
) -> Result<&'static str, EngineError> {
  let language = body.language.unwrap_or_else(|| state.server.default_language.clone());
  let rating = body.users_rating.unwrap_or(state.server.default_rating as i64);
  // Load reference data before touching the session so a bad language leaves it as it was.
  let pack = state.catalog.get(&language).await?;

  let handle = state.sessions.get_or_create(&session_id(&headers)).await;
  let mut session = handle.lock().await;
  session.set_up(ChatSetup { topic: body.conversation_topic, language, rating }, pack);
  Ok("Chat Set Up")
}

#[instrument(level = "info", skip(state, headers, body), fields(session_id = %session_id(&headers), input_len = body.input.len()))]
pub async fn http_generate_response(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<GenerateResponseIn>,
) -> Result<Json<GenerateResponseOut>, EngineError> {
  debug!(
    target: "session",
    client_messages = body.messages.as_ref().and_then(|m| m.as_array()).map(Vec::len),
    client_topic = ?body.conversation_topic,
    client_rating = ?body.users_rating,
    "Ignoring client-held chat state"
  );

  let id = session_id(&headers);
  let handle = existing_session(&state, &headers).await?;
  let mut session = handle.lock().await;
  let outcome = state.engine.handle_message(&mut session, &body.input).await?;

  info!(
    target: "session",
    session_id = %id,
    rating = outcome.rating,
    difficulty = outcome.difficulty,
    help = outcome.was_help_request,
    scored = outcome.score.is_some(),
    "Response generated"
  );
  Ok(Json(GenerateResponseOut {
    data: outcome.reply,
    users_rating: outcome.rating,
    was_help_request: outcome.was_help_request,
    score: outcome.score,
  }))
}

#[instrument(level = "info", skip(state, headers), fields(session_id = %session_id(&headers)))]
pub async fn http_reset_chat(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> impl IntoResponse {
  if let Some(handle) = state.sessions.get(&session_id(&headers)).await {
    handle.lock().await.reset();
  }
  Json(MessageOut { message: "Chat has been reset.".into() })
}

#[instrument(level = "info", skip(state, headers, body), fields(session_id = %session_id(&headers), mistakes = body.mistake_types.len()))]
pub async fn http_record_mistakes(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<RecordMistakesIn>,
) -> Result<Json<RecordMistakesOut>, EngineError> {
  let mistakes: HashSet<String> = body.mistake_types.into_iter().collect();
  let handle = existing_session(&state, &headers).await?;
  let recommendation = handle.lock().await.record_mistakes(&mistakes, state.engine.lesson_policy());
  if let Some(concept) = recommendation {
    info!(target: "lessons", %concept, "Lesson recommended");
  }
  Ok(Json(RecordMistakesOut {
    recommendation: recommendation.map(str::to_string),
    message: recommendation.map(recommendation_message),
  }))
}

/// Read-only: an id that was never set up reports the uninitialized snapshot
/// without registering a session.
#[instrument(level = "info", skip(state, headers), fields(session_id = %session_id(&headers)))]
pub async fn http_session_state(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> impl IntoResponse {
  let out = match state.sessions.get(&session_id(&headers)).await {
    Some(handle) => {
      let session = handle.lock().await;
      snapshot(&session)
    }
    None => snapshot(&Session::default()),
  };
  Json(out)
}

async fn existing_session(state: &AppState, headers: &HeaderMap) -> Result<SessionHandle, EngineError> {
  let id = session_id(headers);
  state
    .sessions
    .get(&id)
    .await
    .ok_or_else(|| EngineError::InvalidSessionState(format!("no chat set up for session '{id}'")))
}

fn snapshot(session: &Session) -> SessionStateOut {
  SessionStateOut {
    phase: session.phase(),
    users_rating: session.rating(),
    cefr_level: session.cefr_level(),
    topic: session.topic().map(str::to_string),
    language: session.language().map(str::to_string),
    message_count: session.history().len(),
    pending_bot_response: session.pending_bot_response().map(str::to_string),
    lesson_counters: CONCEPTS
      .iter()
      .filter_map(|c| session.lessons().counter(c).filter(|v| *v > 0.0).map(|v| (c.to_string(), v)))
      .collect(),
  }
}
