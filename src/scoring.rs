//! Turn scoring and the Elo-style rating update.
//!
//! finalScore = quality + advanced_vocab_bonus - off_language_penalty
//! expected   = 1 / (1 + 10^((difficulty - rating) / 400))
//! rating'    = max(0, trunc(rating + K * (finalScore - expected)))

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::{cefr, MAX_RATING, MIN_RATING};
use crate::error::EngineError;
use crate::oracle::ChatOracle;
use crate::util::word_tokens;
use crate::vocab::LanguagePack;

/// Cap on the advanced-vocabulary bonus; it can only partly offset the penalty.
pub const ADVANCED_BONUS_SCALE: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TurnScore {
  pub quality: f64,
  pub off_language_penalty: f64,
  pub advanced_vocab_bonus: f64,
  /// Diagnostic only; not part of `final_score`.
  pub misspelling_score: f64,
  pub final_score: f64,
}

/// Everything needed to grade one completed (bot, user) exchange.
pub struct TurnContext<'a> {
  pub user_reply: &'a str,
  pub previous_bot_reply: &'a str,
  pub rating: i32,
  pub language: &'a str,
  pub category: &'a str,
  pub pack: &'a LanguagePack,
}

pub fn expected_score(rating: i32, difficulty: i32) -> f64 {
  1.0 / (1.0 + 10f64.powf((difficulty - rating) as f64 / 400.0))
}

pub fn updated_rating(rating: i32, difficulty: i32, final_score: f64, k_factor: f64) -> i32 {
  let next = rating as f64 + k_factor * (final_score - expected_score(rating, difficulty));
  // Truncation toward zero; `as` also maps NaN to 0.
  (next.max(MIN_RATING as f64) as i32).min(MAX_RATING)
}

/// Share of tokens the counter oracle flagged as not in the target language.
pub fn off_language_penalty(off_language_words: usize, token_count: usize) -> f64 {
  if token_count == 0 {
    return 0.0;
  }
  (off_language_words as f64 / token_count as f64).clamp(0.0, 1.0)
}

/// Share of distinct tokens drawn from harder bands, scaled into [0, 0.5].
pub fn advanced_vocab_bonus(tokens: &[String], advanced: &HashSet<&str>) -> f64 {
  let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
  if distinct.is_empty() {
    return 0.0;
  }
  let hits = distinct.iter().filter(|t| advanced.contains(*t)).count();
  hits as f64 / distinct.len() as f64 * ADVANCED_BONUS_SCALE
}

pub fn misspelling_score(unknown_words: usize, token_count: usize) -> f64 {
  if token_count == 0 {
    return 1.0;
  }
  (1.0 - unknown_words as f64 / token_count as f64).max(0.0)
}

/// Grade the user's reply to the previous bot turn.
///
/// Oracle outages propagate; malformed oracle payloads were already folded to 0
/// by the oracle implementation.
#[instrument(level = "info", skip_all, fields(rating = ctx.rating, user_len = ctx.user_reply.len()))]
pub async fn score_turn(oracle: &dyn ChatOracle, ctx: &TurnContext<'_>) -> Result<TurnScore, EngineError> {
  let tokens = word_tokens(ctx.user_reply);

  let quality = oracle
    .score_response(ctx.previous_bot_reply, ctx.user_reply)
    .await?
    .clamp(0.0, 1.0);

  let off_language_penalty = if tokens.is_empty() {
    0.0
  } else {
    let off = oracle.count_off_language_words(ctx.user_reply, ctx.language).await?;
    off_language_penalty(off, tokens.len())
  };

  let advanced = ctx.pack.words_above(ctx.category, cefr(ctx.rating));
  let advanced_vocab_bonus = advanced_vocab_bonus(&tokens, &advanced);

  let unknown = ctx.pack.unknown_words(&tokens);
  let misspelling_score = misspelling_score(unknown.len(), tokens.len());
  debug!(target: "scoring", misspelling_score, unknown = unknown.len(), "Spelling diagnostic");

  let final_score = quality + advanced_vocab_bonus - off_language_penalty;
  info!(
    target: "scoring",
    quality, off_language_penalty, advanced_vocab_bonus, final_score,
    "Turn scored"
  );

  Ok(TurnScore { quality, off_language_penalty, advanced_vocab_bonus, misspelling_score, final_score })
}
