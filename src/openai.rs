//! Minimal OpenAI client backing every conversational and classifier oracle.
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::ChatMessage;
use crate::error::EngineError;
use crate::oracle::{or_absent, parse_help_flag, parse_overall_score, parse_word_count, ChatOracle};
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  prompts: Prompts,
}

impl OpenAI {
  /// Construct the client from the environment. A missing OPENAI_API_KEY is fatal.
  pub fn from_env(prompts: Prompts) -> Result<Self, EngineError> {
    let api_key = std::env::var("OPENAI_API_KEY")
      .ok()
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| EngineError::Configuration("OPENAI_API_KEY is not set".into()))?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(20);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .map_err(|e| EngineError::Configuration(format!("HTTP client: {e}")))?;

    Ok(Self { client, api_key, base_url, fast_model, strong_model, prompts })
  }

  #[instrument(level = "info", skip(self, messages), fields(model = %model, messages = messages.len()))]
  async fn chat(
    &self,
    model: &str,
    messages: Vec<ChatMessageReq>,
    temperature: f32,
    json: bool,
  ) -> Result<String, EngineError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages,
      temperature,
      response_format: json.then(|| ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| EngineError::OracleUnavailable(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(EngineError::OracleUnavailable(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res
      .json()
      .await
      .map_err(|e| EngineError::OracleUnavailable(format!("response body: {e}")))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default().trim().to_string();

    debug!(elapsed = ?start.elapsed(), reply_len = text.len(), "Model response received");
    Ok(text)
  }

  async fn classify(&self, system: &str, user: &str) -> Result<String, EngineError> {
    let messages = vec![ChatMessageReq::new("system", system), ChatMessageReq::new("user", user)];
    self.chat(&self.fast_model, messages, 0.0, true).await
  }
}

#[async_trait]
impl ChatOracle for OpenAI {
  #[instrument(level = "info", skip_all, fields(history = history.len(), has_additional = additional_instructions.is_some()))]
  async fn reply(
    &self,
    instructions: &str,
    additional_instructions: Option<&str>,
    history: &[ChatMessage],
  ) -> Result<String, EngineError> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessageReq::new("system", instructions));
    if let Some(extra) = additional_instructions {
      messages.push(ChatMessageReq::new("system", extra));
    }
    messages.extend(history.iter().map(|m| ChatMessageReq::new(m.role.as_str(), &m.content)));

    let text = self.chat(&self.strong_model, messages, 0.7, false).await?;
    if text.is_empty() {
      warn!(target: "oracle", "Conversational oracle returned an empty reply");
    }
    Ok(text)
  }

  #[instrument(level = "info", skip_all, fields(message_len = message.len()))]
  async fn detect_help(&self, message: &str) -> Result<bool, EngineError> {
    let payload = self.classify(&self.prompts.help_detector_system, message).await?;
    or_absent("help_detector", parse_help_flag(&payload))
  }

  #[instrument(level = "info", skip_all, fields(bot_len = bot_reply.len(), user_len = user_reply.len()))]
  async fn score_response(&self, bot_reply: &str, user_reply: &str) -> Result<f64, EngineError> {
    let user = format!("bot: {bot_reply}\nuser: {user_reply}");
    let payload = self.classify(&self.prompts.response_score_system, &user).await?;
    or_absent("response_score", parse_overall_score(&payload))
  }

  #[instrument(level = "info", skip_all, fields(text_len = text.len(), %language))]
  async fn count_off_language_words(&self, text: &str, language: &str) -> Result<usize, EngineError> {
    let system = fill_template(&self.prompts.off_language_counter_system, &[("language", language)]);
    let payload = self.classify(&system, text).await?;
    or_absent("off_language_counter", parse_word_count(&payload))
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
impl ChatMessageReq {
  fn new(role: &str, content: &str) -> Self {
    Self { role: role.into(), content: content.into() }
  }
}
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
