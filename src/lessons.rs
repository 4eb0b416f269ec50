//! Lesson recommender: decaying per-concept mistake counters.
//!
//! Concepts are iterated in the fixed order of `CONCEPTS`; when several cross
//! the threshold in the same call, the earliest one in that order is the one
//! recommended.

use std::collections::HashSet;

use tracing::{debug, warn};

pub const CONCEPTS: [&str; 40] = [
  "Present Tense Verbs",
  "Preterite Tense",
  "Imperfect Tense",
  "Future Tense",
  "Conditional Tense",
  "Subjunctive Mood",
  "Reflexive Verbs",
  "Commands (Imperatives)",
  "Possessive Adjectives",
  "Possessive Pronouns",
  "Direct Object Pronouns",
  "Indirect Object Pronouns",
  "Double Object Pronouns",
  "Gustar and Similar Verbs",
  "Ser vs. Estar",
  "Por vs. Para",
  "Comparatives and Superlatives",
  "Demonstrative Adjectives",
  "Demonstrative Pronouns",
  "Interrogative Words",
  "Negative Words",
  "Adverbs",
  "Prepositions",
  "Articles",
  "Gender and Number Agreement",
  "Noun-Adjective Agreement",
  "Sentence Structure",
  "Questions and Exclamations",
  "Passive Voice",
  "Relative Pronouns",
  "Conditional Sentences",
  "Idiomatic Expressions",
  "Numbers",
  "Time Expressions",
  "Conjunctions",
  "Gerunds and Present Participles",
  "Infinitives",
  "Future Perfect",
  "Past Perfect (Pluperfect)",
  "Imperfect Subjunctive",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LessonPolicy {
  pub threshold: f64,
  pub decay: f64,
}

impl Default for LessonPolicy {
  fn default() -> Self {
    Self { threshold: 10.0, decay: 0.8 }
  }
}

/// One counter per entry of `CONCEPTS`, same index.
#[derive(Clone, Debug, PartialEq)]
pub struct LessonTracker {
  counters: [f64; CONCEPTS.len()],
}

impl Default for LessonTracker {
  fn default() -> Self {
    Self { counters: [0.0; CONCEPTS.len()] }
  }
}

impl LessonTracker {
  pub fn counter(&self, concept: &str) -> Option<f64> {
    CONCEPTS.iter().position(|c| *c == concept).map(|i| self.counters[i])
  }

  /// Fold one batch of mistake types into the tracker.
  ///
  /// Mistaken concepts gain exactly 1; every other concept decays by the
  /// policy factor. Returns the new tracker and at most one recommendation:
  /// the first concept (in `CONCEPTS` order) at or over the threshold.
  pub fn record_mistakes(
    &self,
    mistake_types: &HashSet<String>,
    policy: LessonPolicy,
  ) -> (LessonTracker, Option<&'static str>) {
    for m in mistake_types {
      if !CONCEPTS.contains(&m.as_str()) {
        warn!(target: "lessons", concept = %m, "Unknown mistake type ignored");
      }
    }

    let mut next = self.clone();
    let mut recommendation = None;
    for (i, concept) in CONCEPTS.iter().enumerate() {
      if mistake_types.contains(*concept) {
        next.counters[i] += 1.0;
        if recommendation.is_none() && next.counters[i] >= policy.threshold {
          recommendation = Some(*concept);
        }
      } else {
        next.counters[i] *= policy.decay;
      }
    }

    if let Some(concept) = recommendation {
      debug!(target: "lessons", %concept, "Lesson threshold reached");
    }
    (next, recommendation)
  }
}

/// Learner-facing sentence for a recommendation.
pub fn recommendation_message(concept: &str) -> String {
  format!(
    "I have noticed that you struggle with this particular concept: {concept}. I recommend you take a lesson to work on this."
  )
}
