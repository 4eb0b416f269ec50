//! Domain models: rating bounds, CEFR bands, and chat messages.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_RATING: i32 = 0;
pub const MAX_RATING: i32 = 2000;

/// Clamp any rating-like value into the valid domain.
pub fn clamp_rating(rating: i64) -> i32 {
  rating.clamp(MIN_RATING as i64, MAX_RATING as i64) as i32
}

/// Common European Framework of Reference proficiency band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
  A1,
  A2,
  B1,
  B2,
  C1,
  C2,
  Unknown,
}

impl CefrLevel {
  /// The six real bands, lowest first.
  pub const BANDS: [CefrLevel; 6] = [
    CefrLevel::A1,
    CefrLevel::A2,
    CefrLevel::B1,
    CefrLevel::B2,
    CefrLevel::C1,
    CefrLevel::C2,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      CefrLevel::A1 => "A1",
      CefrLevel::A2 => "A2",
      CefrLevel::B1 => "B1",
      CefrLevel::B2 => "B2",
      CefrLevel::C1 => "C1",
      CefrLevel::C2 => "C2",
      CefrLevel::Unknown => "Unknown",
    }
  }

  /// Bands strictly harder than `self`. `Unknown` has none.
  pub fn above(self) -> impl Iterator<Item = CefrLevel> {
    Self::BANDS
      .into_iter()
      .filter(move |b| self != CefrLevel::Unknown && *b > self)
  }
}

impl fmt::Display for CefrLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Map a rating onto its CEFR band. Contiguous bands over [0, 2000];
/// anything outside that range is `Unknown`.
pub fn cefr(rating: i32) -> CefrLevel {
  match rating {
    0..=333 => CefrLevel::A1,
    334..=666 => CefrLevel::A2,
    667..=1000 => CefrLevel::B1,
    1001..=1333 => CefrLevel::B2,
    1334..=1666 => CefrLevel::C1,
    1667..=2000 => CefrLevel::C2,
    _ => CefrLevel::Unknown,
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Assistant => "assistant",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: Role,
  pub content: String,
}

impl ChatMessage {
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: Role::User, content: content.into() }
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self { role: Role::Assistant, content: content.into() }
  }
}
