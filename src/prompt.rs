//! Prompt composition for the next conversational turn.
//!
//! The sampled difficulty is returned with the instructions: the same value is
//! later scored against, so it must never be drawn twice for one turn.

use tracing::{debug, instrument};

use crate::config::{EngineTuning, Prompts};
use crate::difficulty::DifficultySampler;
use crate::domain::{cefr, CefrLevel};
use crate::error::EngineError;
use crate::util::fill_template;
use crate::vocab::LanguagePack;

#[derive(Clone, Debug)]
pub struct PromptRequest<'a> {
  pub rating: i32,
  pub topic: &'a str,
  pub language: &'a str,
  pub native_language: &'a str,
  pub is_help_request: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComposedPrompt {
  pub instructions: String,
  /// Step list sent alongside practice instructions; help turns have none.
  pub additional_instructions: Option<String>,
  pub difficulty: i32,
  pub band: CefrLevel,
  pub category: String,
}

#[instrument(level = "debug", skip(sampler, pack, prompts, tuning), fields(rating = req.rating, help = req.is_help_request))]
pub fn compose_prompt(
  sampler: &dyn DifficultySampler,
  pack: &LanguagePack,
  prompts: &Prompts,
  tuning: &EngineTuning,
  req: &PromptRequest<'_>,
) -> Result<ComposedPrompt, EngineError> {
  let difficulty = sampler.sample(req.rating, tuning.difficulty_mean_offset, tuning.difficulty_std_dev);
  let band = cefr(difficulty);
  let category = pack.table.resolve_category(req.topic, &tuning.default_category).to_string();
  let level = pack.table.level(&category, band)?;
  debug!(target: "session", difficulty, %band, %category, "Turn difficulty sampled");

  let vocabulary_files = level.vocabulary.join(", ");
  let pairs = [
    ("language", req.language),
    ("topic", req.topic),
    ("native_language", req.native_language),
    ("vocabulary_files", vocabulary_files.as_str()),
    ("cefr_level", band.as_str()),
    ("grammar", level.grammar.as_str()),
  ];

  let (instructions, additional_instructions) = if req.is_help_request {
    (fill_template(&prompts.help_instructions_template, &pairs), None)
  } else {
    (
      fill_template(&prompts.practice_instructions_template, &pairs),
      Some(prompts.practice_additional_instructions.clone()),
    )
  };

  Ok(ComposedPrompt { instructions, additional_instructions, difficulty, band, category })
}
