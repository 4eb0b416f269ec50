//! Chat session state and the per-message pipeline.
//!
//! Lifecycle: Uninitialized --set_up--> Ready --message--> AwaitingResponse --> Ready ...
//! `reset` returns any phase to Uninitialized in place.
//!
//! A message cycle reads the session, computes every derived value (help flag,
//! prompt, reply, new rating) and only then writes the session. A failure at
//! any step leaves history, rating and the pending reply untouched.

use std::{collections::HashSet, sync::Arc};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{EngineTuning, Prompts};
use crate::difficulty::DifficultySampler;
use crate::domain::{cefr, clamp_rating, CefrLevel, ChatMessage};
use crate::error::EngineError;
use crate::lessons::{LessonPolicy, LessonTracker};
use crate::oracle::ChatOracle;
use crate::prompt::{compose_prompt, PromptRequest};
use crate::scoring::{score_turn, updated_rating, TurnContext, TurnScore};
use crate::vocab::LanguagePack;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
  Uninitialized,
  Ready,
  AwaitingResponse,
}

#[derive(Clone, Debug)]
pub struct ChatSetup {
  pub topic: String,
  pub language: String,
  pub rating: i64,
}

pub struct Session {
  /// Regenerated on every setup; lets logs tell consecutive chats apart.
  pub instance: Uuid,
  phase: SessionPhase,
  rating: Option<i32>,
  topic: Option<String>,
  language: Option<String>,
  pack: Option<Arc<LanguagePack>>,
  history: Vec<ChatMessage>,
  pending_bot_response: Option<String>,
  lessons: LessonTracker,
}

impl Default for Session {
  fn default() -> Self {
    Self {
      instance: Uuid::new_v4(),
      phase: SessionPhase::Uninitialized,
      rating: None,
      topic: None,
      language: None,
      pack: None,
      history: Vec::new(),
      pending_bot_response: None,
      lessons: LessonTracker::default(),
    }
  }
}

impl Session {
  pub fn phase(&self) -> SessionPhase { self.phase }
  pub fn rating(&self) -> Option<i32> { self.rating }
  pub fn topic(&self) -> Option<&str> { self.topic.as_deref() }
  pub fn language(&self) -> Option<&str> { self.language.as_deref() }
  pub fn history(&self) -> &[ChatMessage] { &self.history }
  pub fn pending_bot_response(&self) -> Option<&str> { self.pending_bot_response.as_deref() }
  pub fn lessons(&self) -> &LessonTracker { &self.lessons }

  /// Derived from the rating on every call; `Unknown` before setup.
  pub fn cefr_level(&self) -> CefrLevel {
    self.rating.map(cefr).unwrap_or(CefrLevel::Unknown)
  }

  /// Uninitialized|Ready -> Ready. Clears the conversation, keeps lesson counters.
  pub fn set_up(&mut self, setup: ChatSetup, pack: Arc<LanguagePack>) {
    self.instance = Uuid::new_v4();
    self.rating = Some(clamp_rating(setup.rating));
    self.topic = Some(setup.topic);
    self.language = Some(setup.language);
    self.pack = Some(pack);
    self.history.clear();
    self.pending_bot_response = None;
    self.phase = SessionPhase::Ready;
    info!(target: "session", instance = %self.instance, rating = ?self.rating, topic = ?self.topic, language = ?self.language, "Chat set up");
  }

  /// Any phase -> Uninitialized; further messages require a new setup.
  pub fn reset(&mut self) {
    let instance = self.instance;
    *self = Session { instance, ..Session::default() };
    info!(target: "session", %instance, "Chat has been reset");
  }

  pub fn record_mistakes(&mut self, mistake_types: &HashSet<String>, policy: LessonPolicy) -> Option<&'static str> {
    let (next, recommendation) = self.lessons.record_mistakes(mistake_types, policy);
    self.lessons = next;
    recommendation
  }
}

#[derive(Clone, Debug)]
pub struct TurnOutcome {
  pub reply: String,
  pub rating: i32,
  pub was_help_request: bool,
  pub difficulty: i32,
  pub score: Option<TurnScore>,
}

/// Holds a session in `AwaitingResponse` for one cycle. Dropping it, including
/// when the request future is cancelled mid-await, puts the session back to `Ready`.
struct CycleGuard<'a> {
  session: &'a mut Session,
}

impl<'a> CycleGuard<'a> {
  fn begin(session: &'a mut Session) -> Self {
    session.phase = SessionPhase::AwaitingResponse;
    Self { session }
  }
}

impl Drop for CycleGuard<'_> {
  fn drop(&mut self) {
    self.session.phase = SessionPhase::Ready;
  }
}

/// Shared, stateless collaborators of every session.
pub struct Engine {
  oracle: Arc<dyn ChatOracle>,
  sampler: Arc<dyn DifficultySampler>,
  prompts: Prompts,
  tuning: EngineTuning,
  native_language: String,
}

impl Engine {
  pub fn new(
    oracle: Arc<dyn ChatOracle>,
    sampler: Arc<dyn DifficultySampler>,
    prompts: Prompts,
    tuning: EngineTuning,
    native_language: impl Into<String>,
  ) -> Self {
    Self { oracle, sampler, prompts, tuning, native_language: native_language.into() }
  }

  pub fn lesson_policy(&self) -> LessonPolicy {
    LessonPolicy { threshold: self.tuning.lesson_threshold, decay: self.tuning.lesson_decay }
  }

  /// One Ready -> AwaitingResponse -> Ready cycle. The caller must hold the
  /// session exclusively for the whole call.
  #[instrument(level = "info", skip(self, session, message), fields(instance = %session.instance, message_len = message.len()))]
  pub async fn handle_message(&self, session: &mut Session, message: &str) -> Result<TurnOutcome, EngineError> {
    if session.phase != SessionPhase::Ready {
      return Err(EngineError::InvalidSessionState(format!(
        "session is {:?}; call /set-up-chat first",
        session.phase
      )));
    }

    let mut cycle = CycleGuard::begin(session);
    let outcome = match self.run_cycle(&*cycle.session, message).await {
      Ok(o) => o,
      Err(e) => {
        warn!(target: "session", error = %e, retryable = e.is_retryable(), "Message cycle failed; session left unchanged");
        return Err(e);
      }
    };

    let session = &mut *cycle.session;
    session.history.push(ChatMessage::user(message));
    session.history.push(ChatMessage::assistant(outcome.reply.clone()));
    session.rating = Some(outcome.rating);
    session.pending_bot_response = Some(outcome.reply.clone());
    Ok(outcome)
  }

  async fn run_cycle(&self, session: &Session, message: &str) -> Result<TurnOutcome, EngineError> {
    let (Some(rating), Some(topic), Some(language), Some(pack)) =
      (session.rating, session.topic.as_deref(), session.language.as_deref(), session.pack.as_deref())
    else {
      return Err(EngineError::InvalidSessionState("session is missing its setup".into()));
    };

    let is_help = self.oracle.detect_help(message).await?;
    debug!(target: "session", is_help, "Help intent classified");

    let prompt = compose_prompt(
      self.sampler.as_ref(),
      pack,
      &self.prompts,
      &self.tuning,
      &PromptRequest {
        rating,
        topic,
        language,
        native_language: &self.native_language,
        is_help_request: is_help,
      },
    )?;

    debug!(target: "session", band = %prompt.band, category = %prompt.category, "Prompt composed");

    let mut draft = Vec::with_capacity(session.history.len() + 1);
    draft.extend_from_slice(&session.history);
    draft.push(ChatMessage::user(message));
    let reply = self
      .oracle
      .reply(&prompt.instructions, prompt.additional_instructions.as_deref(), &draft)
      .await?;

    let (score, new_rating) = match session.pending_bot_response.as_deref() {
      Some(previous) if !is_help => {
        let ctx = TurnContext {
          user_reply: message,
          previous_bot_reply: previous,
          rating,
          language,
          category: &prompt.category,
          pack,
        };
        let score = score_turn(self.oracle.as_ref(), &ctx).await?;
        let next = updated_rating(rating, prompt.difficulty, score.final_score, self.tuning.k_factor);
        info!(target: "session", from = rating, to = next, difficulty = prompt.difficulty, "Rating updated");
        (Some(score), next)
      }
      _ => (None, rating),
    };

    Ok(TurnOutcome {
      reply,
      rating: new_rating,
      was_help_request: is_help,
      difficulty: prompt.difficulty,
      score,
    })
  }
}
