//! Per-language reference data: the category → band → level table and the
//! plain-text vocabulary word lists it points at.
//!
//! Layout under DATA_DIR:
//!   <Language>_categories.json   {category: {band: {vocabulary: [file ids], grammar: "..."}}}
//!   <file id>                    one word per line

use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
  sync::Arc,
};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::CefrLevel;
use crate::error::EngineError;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LevelEntry {
  #[serde(default)]
  pub vocabulary: Vec<String>,
  #[serde(default)]
  pub grammar: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct VocabularyTable {
  categories: HashMap<String, HashMap<String, LevelEntry>>,
}

impl VocabularyTable {
  pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(s)
  }

  /// A category named like the topic (case-insensitive) wins; otherwise the default.
  pub fn resolve_category<'a>(&'a self, topic: &str, default_category: &'a str) -> &'a str {
    let wanted = topic.trim();
    self
      .categories
      .keys()
      .find(|name| name.eq_ignore_ascii_case(wanted))
      .map(String::as_str)
      .unwrap_or(default_category)
  }

  pub fn level(&self, category: &str, band: CefrLevel) -> Result<&LevelEntry, EngineError> {
    self
      .categories
      .get(category)
      .and_then(|levels| levels.get(band.as_str()))
      .ok_or_else(|| EngineError::MissingLevelData { category: category.to_string(), band })
  }

  fn file_ids(&self) -> impl Iterator<Item = &String> {
    self.categories.values().flat_map(|levels| levels.values()).flat_map(|e| e.vocabulary.iter())
  }
}

/// Everything the engine reads for one target language. Immutable once built.
#[derive(Debug)]
pub struct LanguagePack {
  pub language: String,
  pub table: VocabularyTable,
  word_lists: HashMap<String, HashSet<String>>,
}

impl LanguagePack {
  pub fn new(
    language: impl Into<String>,
    table: VocabularyTable,
    word_lists: HashMap<String, HashSet<String>>,
  ) -> Self {
    Self { language: language.into(), table, word_lists }
  }

  /// Read the level table and every word list it references.
  /// Missing word lists are skipped; a missing table is a configuration error.
  #[instrument(level = "info", skip(data_dir), fields(data_dir = %data_dir.display()))]
  pub fn load(data_dir: &Path, language: &str) -> Result<Self, EngineError> {
    if !is_language_name(language) {
      return Err(EngineError::Configuration(format!("invalid language name '{language}'")));
    }
    let table_path = data_dir.join(format!("{language}_categories.json"));
    let raw = std::fs::read_to_string(&table_path).map_err(|e| {
      EngineError::Configuration(format!("cannot read {}: {e}", table_path.display()))
    })?;
    let table = VocabularyTable::from_json_str(&raw).map_err(|e| {
      EngineError::Configuration(format!("cannot parse {}: {e}", table_path.display()))
    })?;

    let mut word_lists = HashMap::new();
    for id in table.file_ids() {
      if word_lists.contains_key(id) {
        continue;
      }
      match std::fs::read_to_string(data_dir.join(id)) {
        Ok(text) => {
          word_lists.insert(id.clone(), parse_word_list(&text));
        }
        Err(e) => warn!(target: "converso_backend", %language, file = %id, error = %e, "Vocabulary file unreadable; skipping"),
      }
    }

    info!(target: "converso_backend", %language, word_lists = word_lists.len(), "Language pack loaded");
    Ok(Self::new(language, table, word_lists))
  }

  /// Union of the word lists for every band strictly above `band` in `category`.
  pub fn words_above(&self, category: &str, band: CefrLevel) -> HashSet<&str> {
    band
      .above()
      .filter_map(|b| self.table.level(category, b).ok())
      .flat_map(|entry| entry.vocabulary.iter())
      .filter_map(|id| self.word_lists.get(id))
      .flat_map(|words| words.iter().map(String::as_str))
      .collect()
  }

  /// Dictionary lookup: tokens found in none of the language's word lists.
  pub fn unknown_words<'t>(&self, tokens: &'t [String]) -> HashSet<&'t str> {
    tokens
      .iter()
      .filter(|t| !self.word_lists.values().any(|list| list.contains(t.as_str())))
      .map(String::as_str)
      .collect()
  }
}

pub fn parse_word_list(text: &str) -> HashSet<String> {
  text
    .lines()
    .map(|l| l.trim().to_lowercase())
    .filter(|l| !l.is_empty() && !l.starts_with('#'))
    .collect()
}

/// Language names become file names under DATA_DIR, so only letters and digits pass.
fn is_language_name(language: &str) -> bool {
  !language.is_empty() && language.chars().all(char::is_alphanumeric)
}

/// Lazily loaded, process-wide cache of language packs.
pub struct LanguageCatalog {
  data_dir: PathBuf,
  packs: RwLock<HashMap<String, Arc<LanguagePack>>>,
}

impl LanguageCatalog {
  pub fn new(data_dir: impl Into<PathBuf>) -> Self {
    Self { data_dir: data_dir.into(), packs: RwLock::new(HashMap::new()) }
  }

  pub async fn insert(&self, pack: LanguagePack) -> Arc<LanguagePack> {
    let pack = Arc::new(pack);
    self.packs.write().await.insert(pack.language.clone(), pack.clone());
    pack
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn get(&self, language: &str) -> Result<Arc<LanguagePack>, EngineError> {
    if let Some(p) = { self.packs.read().await.get(language).cloned() } {
      return Ok(p);
    }
    let mut packs = self.packs.write().await;
    // Another request may have loaded it while we waited for the write lock.
    if let Some(p) = packs.get(language) {
      return Ok(p.clone());
    }
    // File reads run on the blocking pool. Holding the write lock meanwhile
    // keeps concurrent first requests from loading the same pack twice.
    let data_dir = self.data_dir.clone();
    let name = language.to_string();
    let pack = tokio::task::spawn_blocking(move || LanguagePack::load(&data_dir, &name))
      .await
      .map_err(|e| EngineError::Configuration(format!("language pack loader failed: {e}")))??;
    let pack = Arc::new(pack);
    packs.insert(language.to_string(), pack.clone());
    Ok(pack)
  }
}
