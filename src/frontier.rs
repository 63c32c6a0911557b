//! # Frontier Sampling
//!
//! $$
//! \mathbf{w}=\frac{(E_1,\dots,E_N)}{\sum_k E_k},\quad E_k\overset{iid}{\sim}\operatorname{Exp}(1)
//! \ \Rightarrow\ \mathbf{w}\sim\operatorname{Dirichlet}(1,\dots,1)
//! $$
//!
//! Monte Carlo scatter of long-only portfolios drawn uniformly from the weight
//! simplex. Fidelity to the analytic frontier grows with the sample count.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Exp1;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::MAX_ASSETS;
use crate::MIN_ASSETS;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::estimator::Moments;
use crate::series::check_asset_count;
use crate::types::FrontierPoint;

/// Upper bound on draws per request.
pub const MAX_SAMPLES: usize = 20_000;

const CHUNK_SEED_STRIDE: u64 = 0xD134_2543_DE82_EF95;

/// Runtime configuration for [`sample_frontier`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
  /// Number of simplex draws, in `1..=MAX_SAMPLES`.
  pub samples: usize,
  /// Seed of the per-chunk generators.
  pub seed: u64,
  /// Draws per parallel work unit. Changing it changes the sampled set.
  pub chunk_size: usize,
}

impl Default for FrontierConfig {
  fn default() -> Self {
    Self {
      samples: 10_000,
      seed: 42,
      chunk_size: 1_000,
    }
  }
}

impl FrontierConfig {
  pub fn validate(&self) -> Result<()> {
    if !(1..=MAX_SAMPLES).contains(&self.samples) {
      return Err(PortfolioError::InvalidControl {
        name: "samples",
        value: self.samples as f64,
        expected: "between 1 and 20000",
      });
    }
    if self.chunk_size == 0 {
      return Err(PortfolioError::InvalidControl {
        name: "chunk_size",
        value: 0.0,
        expected: "at least 1",
      });
    }
    Ok(())
  }
}

/// Draw one weight vector uniformly from the `n`-asset simplex.
pub fn sample_simplex<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
  let raw: Vec<f64> = (0..n).map(|_| Exp1.sample(rng)).collect();
  let sum: f64 = raw.iter().sum();
  if sum > 0.0 {
    raw.iter().map(|e| e / sum).collect()
  } else {
    vec![1.0 / n as f64; n]
  }
}

/// Sampled frontier candidates ordered by ascending volatility.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frontier {
  points: Vec<FrontierPoint>,
  discarded: usize,
}

impl Frontier {
  /// Drop non-finite candidates and sort the rest by volatility (stable).
  pub fn from_candidates(candidates: Vec<FrontierPoint>) -> Self {
    let total = candidates.len();
    let mut points: Vec<FrontierPoint> = candidates
      .into_iter()
      .filter(|p| p.portfolio.is_finite())
      .collect();
    points.sort_by(|a, b| a.volatility().total_cmp(&b.volatility()));

    Self {
      discarded: total - points.len(),
      points,
    }
  }

  pub fn points(&self) -> &[FrontierPoint] {
    &self.points
  }

  pub fn into_points(self) -> Vec<FrontierPoint> {
    self.points
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Candidates excluded because their return or volatility was not finite.
  pub fn discarded(&self) -> usize {
    self.discarded
  }

  /// Upper envelope: points no other point beats on both volatility and return.
  pub fn efficient_subset(&self) -> Vec<FrontierPoint> {
    let mut ordered: Vec<&FrontierPoint> = self.points.iter().collect();
    ordered.sort_by(|a, b| {
      a.volatility()
        .total_cmp(&b.volatility())
        .then(b.expected_return().total_cmp(&a.expected_return()))
    });

    let mut best = f64::NEG_INFINITY;
    let mut out = Vec::new();
    for p in ordered {
      if p.expected_return() > best {
        best = p.expected_return();
        out.push(p.clone());
      }
    }
    out
  }
}

fn draw_points<R: Rng + ?Sized>(moments: &Moments, count: usize, rng: &mut R) -> Vec<FrontierPoint> {
  let n = moments.n_assets();
  (0..count)
    .map(|_| FrontierPoint::from(moments.portfolio(sample_simplex(n, rng))))
    .collect()
}

/// Sequential sampling from a caller-supplied generator.
pub fn sample_frontier_with_rng<R: Rng + ?Sized>(
  moments: &Moments,
  samples: usize,
  rng: &mut R,
) -> Result<Frontier> {
  check_asset_count(moments.n_assets(), MIN_ASSETS, MAX_ASSETS)?;
  Ok(Frontier::from_candidates(draw_points(moments, samples, rng)))
}

fn chunk_seed(seed: u64, chunk: usize) -> u64 {
  seed.wrapping_add(CHUNK_SEED_STRIDE.wrapping_mul((chunk as u64).wrapping_add(1)))
}

/// Parallel sampling; each chunk owns a generator seeded from `(seed, chunk)`,
/// so the result does not depend on the number of worker threads.
pub fn sample_frontier(moments: &Moments, config: &FrontierConfig) -> Result<Frontier> {
  check_asset_count(moments.n_assets(), MIN_ASSETS, MAX_ASSETS)?;
  config.validate()?;

  let chunks = config.samples.div_ceil(config.chunk_size);
  let candidates: Vec<FrontierPoint> = (0..chunks)
    .into_par_iter()
    .map(|chunk| {
      let mut rng = StdRng::seed_from_u64(chunk_seed(config.seed, chunk));
      let start = chunk * config.chunk_size;
      let count = config.chunk_size.min(config.samples - start);
      draw_points(moments, count, &mut rng)
    })
    .collect::<Vec<_>>()
    .into_iter()
    .flatten()
    .collect();

  let frontier = Frontier::from_candidates(candidates);
  if frontier.discarded() > 0 {
    tracing::warn!(
      discarded = frontier.discarded(),
      kept = frontier.len(),
      "dropped non-finite frontier candidates"
    );
  }
  tracing::debug!(
    samples = config.samples,
    chunks,
    assets = moments.n_assets(),
    "sampled frontier"
  );

  Ok(frontier)
}
