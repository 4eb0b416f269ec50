//! Test doubles: a scripted oracle that counts calls, a fixed sampler, and a
//! small in-memory Spanish language pack.

use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
  },
};

use async_trait::async_trait;

use crate::difficulty::DifficultySampler;
use crate::domain::ChatMessage;
use crate::error::EngineError;
use crate::oracle::ChatOracle;
use crate::vocab::{parse_word_list, LanguagePack, VocabularyTable};

pub struct FixedSampler(pub i32);

impl DifficultySampler for FixedSampler {
  fn sample(&self, _rating: i32, _mean_offset: f64, _std_dev: f64) -> i32 {
    self.0
  }
}

#[derive(Default)]
pub struct OracleCalls {
  pub help: AtomicUsize,
  pub reply: AtomicUsize,
  pub score: AtomicUsize,
  pub off_language: AtomicUsize,
}

impl OracleCalls {
  pub fn total(&self) -> usize {
    self.help.load(Ordering::SeqCst)
      + self.reply.load(Ordering::SeqCst)
      + self.score.load(Ordering::SeqCst)
      + self.off_language.load(Ordering::SeqCst)
  }
}

/// Replies are "bot reply 1", "bot reply 2", ... in call order.
#[derive(Default)]
pub struct ScriptedOracle {
  pub help: AtomicBool,
  /// When set, help detection never completes.
  pub hang_help: AtomicBool,
  pub off_language: AtomicUsize,
  pub fail_reply: AtomicBool,
  pub fail_scoring: AtomicBool,
  quality: Mutex<f64>,
  pub last_instructions: Mutex<Option<String>>,
  pub last_history: Mutex<Vec<ChatMessage>>,
  pub calls: OracleCalls,
}

impl ScriptedOracle {
  pub fn set_quality(&self, q: f64) {
    *self.quality.lock().unwrap() = q;
  }
}

#[async_trait]
impl ChatOracle for ScriptedOracle {
  async fn reply(
    &self,
    instructions: &str,
    _additional_instructions: Option<&str>,
    history: &[ChatMessage],
  ) -> Result<String, EngineError> {
    let n = self.calls.reply.fetch_add(1, Ordering::SeqCst) + 1;
    if self.fail_reply.load(Ordering::SeqCst) {
      return Err(EngineError::OracleUnavailable("scripted reply outage".into()));
    }
    *self.last_instructions.lock().unwrap() = Some(instructions.to_string());
    *self.last_history.lock().unwrap() = history.to_vec();
    Ok(format!("bot reply {n}"))
  }

  async fn detect_help(&self, _message: &str) -> Result<bool, EngineError> {
    self.calls.help.fetch_add(1, Ordering::SeqCst);
    if self.hang_help.load(Ordering::SeqCst) {
      std::future::pending::<()>().await;
    }
    Ok(self.help.load(Ordering::SeqCst))
  }

  async fn score_response(&self, _bot_reply: &str, _user_reply: &str) -> Result<f64, EngineError> {
    self.calls.score.fetch_add(1, Ordering::SeqCst);
    if self.fail_scoring.load(Ordering::SeqCst) {
      return Err(EngineError::OracleUnavailable("scripted scoring outage".into()));
    }
    Ok(*self.quality.lock().unwrap())
  }

  async fn count_off_language_words(&self, _text: &str, _language: &str) -> Result<usize, EngineError> {
    self.calls.off_language.fetch_add(1, Ordering::SeqCst);
    Ok(self.off_language.load(Ordering::SeqCst))
  }
}

const SAMPLE_TABLE: &str = r#"{
  "General Conversation": {
    "A1": {"vocabulary": ["a1_words.txt"], "grammar": "present tense of regular verbs"},
    "A2": {"vocabulary": ["a2_words.txt"], "grammar": "preterite tense"},
    "B1": {"vocabulary": ["b1_words.txt"], "grammar": "imperfect vs preterite"}
  },
  "Food": {
    "A1": {"vocabulary": ["food_a1.txt"], "grammar": "gustar with nouns"}
  }
}"#;

pub fn sample_pack() -> LanguagePack {
  let table = VocabularyTable::from_json_str(SAMPLE_TABLE).expect("sample table parses");
  let lists = HashMap::from([
    ("a1_words.txt".to_string(), parse_word_list("hola\nyo\nser\nestar\ncasa\n")),
    ("a2_words.txt".to_string(), parse_word_list("ayer\nviaje\nsemana\n")),
    ("b1_words.txt".to_string(), parse_word_list("aunque\nembargo\n")),
    ("food_a1.txt".to_string(), parse_word_list("pan\nagua\nmanzana\n")),
  ]);
  LanguagePack::new("Spanish", table, lists)
}
