//! Randomized "opponent" difficulty around the learner's rating.
//!
//! The draw is normal around `rating + mean_offset` and always clamped into
//! the rating domain. Production uses the thread RNG; `SeededSampler` gives
//! reproducible sequences.

use std::sync::Mutex;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::domain::clamp_rating;

pub trait DifficultySampler: Send + Sync {
  fn sample(&self, rating: i32, mean_offset: f64, std_dev: f64) -> i32;
}

/// One draw from N(rating + mean_offset, std_dev), truncated and clamped.
/// A non-finite or non-positive deviation collapses to the mean.
pub fn draw<R: Rng + ?Sized>(rng: &mut R, rating: i32, mean_offset: f64, std_dev: f64) -> i32 {
  let mean = rating as f64 + mean_offset;
  let raw = match Normal::new(mean, std_dev) {
    Ok(normal) if std_dev.is_finite() && std_dev > 0.0 => normal.sample(rng),
    _ => mean,
  };
  if !raw.is_finite() {
    return clamp_rating(if raw > 0.0 { i64::MAX } else { 0 });
  }
  // `as` saturates on overflow, so huge draws still land on the bounds.
  clamp_rating(raw as i64)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NormalSampler;

impl DifficultySampler for NormalSampler {
  fn sample(&self, rating: i32, mean_offset: f64, std_dev: f64) -> i32 {
    draw(&mut rand::thread_rng(), rating, mean_offset, std_dev)
  }
}

pub struct SeededSampler {
  rng: Mutex<StdRng>,
}

impl SeededSampler {
  pub fn new(seed: u64) -> Self {
    Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
  }
}

impl DifficultySampler for SeededSampler {
  fn sample(&self, rating: i32, mean_offset: f64, std_dev: f64) -> i32 {
    // Poisoning leaves the RNG state intact.
    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
    draw(&mut *rng, rating, mean_offset, std_dev)
  }
}
