//! Configuration: process settings from the environment, prompts and engine
//! tuning from an optional TOML file (AGENT_CONFIG_PATH).
//!
//! TOML schema:
//!   [prompts]  every oracle system prompt + instruction templates
//!   [engine]   rating/difficulty/lesson constants
//! Missing keys fall back to the defaults below.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct ServerConfig {
  pub port: u16,
  pub data_dir: PathBuf,
  pub default_language: String,
  pub native_language: String,
  pub default_rating: i32,
  /// Seeds the difficulty sampler for reproducible runs.
  pub difficulty_seed: Option<u64>,
}

impl ServerConfig {
  pub fn from_env() -> Self {
    Self {
      port: env_parse("PORT").unwrap_or(5001),
      data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| "./data".into()),
      default_language: std::env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "Spanish".into()),
      native_language: std::env::var("NATIVE_LANGUAGE").unwrap_or_else(|_| "English".into()),
      default_rating: env_parse("DEFAULT_RATING").unwrap_or(300),
      difficulty_seed: env_parse("DIFFICULTY_SEED"),
    }
  }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
  std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub engine: EngineTuning,
}

/// Constants of the adaptive loop.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
  pub k_factor: f64,
  pub difficulty_std_dev: f64,
  pub difficulty_mean_offset: f64,
  pub lesson_threshold: f64,
  pub lesson_decay: f64,
  pub default_category: String,
}

impl Default for EngineTuning {
  fn default() -> Self {
    Self {
      k_factor: 5.0,
      difficulty_std_dev: 400.0,
      difficulty_mean_offset: 0.0,
      lesson_threshold: 10.0,
      lesson_decay: 0.8,
      default_category: "General Conversation".into(),
    }
  }
}

/// Prompts used by the oracles and the prompt composer.
/// Instruction templates accept `{language}`, `{topic}`, `{native_language}`,
/// `{vocabulary_files}`, `{cefr_level}` and `{grammar}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub help_instructions_template: String,
  pub practice_instructions_template: String,
  pub practice_additional_instructions: String,
  pub help_detector_system: String,
  pub response_score_system: String,
  pub off_language_counter_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      help_instructions_template: "You are a helpful assistant for helping the user learn {language} through a conversation about {topic}. \
        The user currently needs your help in this conversation. Help them with what they need. \
        Make sure your response is in {native_language} primarily. \
        Only include {language} in the response if the user asks for a translation or for the meaning of a word.".into(),
      practice_instructions_template: "You are a helpful assistant for helping the user learn {language} through a conversation about {topic}. \
        You are only allowed to use vocabulary within {vocabulary_files} as well as their conjugations and similar words since you are talking at a {cefr_level} level. \
        Try to apply these grammar rules in the conversation to help the user learn and get familiar with them: {grammar}. \
        If the user makes a mistake, let them know in {native_language} that they have made a mistake, tell them what their mistake was, and tell them how to fix it. \
        If the user types a word in {native_language} be sure to tell them the word in {language} so they know how to say the word from now on. \
        Finally, continue the conversation where it left off.".into(),
      practice_additional_instructions: "1.) Read your instructions\n\
        2.) Only use vocabulary from the files you are allowed to use\n\
        3.) Respond".into(),
      help_detector_system: "You classify whether a language learner is asking for help (a translation, an explanation, or what to say) instead of practicing. \
        Reply with strict JSON: {\"user_asking_for_help\": \"yes\" | \"no\"}.".into(),
      response_score_system: "You grade a language learner's reply to a conversation partner. \
        Judge relevance, grammar and naturalness together. \
        Reply with strict JSON: {\"Overall Score\": number between 0 and 1}.".into(),
      off_language_counter_system: "Count the words in the user's text that are not {language}. \
        Reply with strict JSON: {\"number_of_english_words\": integer}.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "converso_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "converso_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "converso_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
