//! # Portfolio Types
//!
//! $$
//! \mu_p=\mathbf{w}^\top\mu,\qquad \sigma_p=\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}
//! $$
//!
//! Value types shared by the optimizers, the frontier sampler and the selector.

use serde::Serialize;

use crate::WEIGHT_TOLERANCE;

/// A long-only allocation with its model return and volatility.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Portfolio {
  volatility: f64,
  #[serde(rename = "return")]
  expected_return: f64,
  weights: Vec<f64>,
}

impl Portfolio {
  pub(crate) fn new(weights: Vec<f64>, expected_return: f64, volatility: f64) -> Self {
    Self {
      volatility,
      expected_return,
      weights,
    }
  }

  pub fn weights(&self) -> &[f64] {
    &self.weights
  }

  pub fn expected_return(&self) -> f64 {
    self.expected_return
  }

  pub fn volatility(&self) -> f64 {
    self.volatility
  }

  /// Weights as percentages.
  pub fn weights_pct(&self) -> Vec<f64> {
    self.weights.iter().map(|w| w * 100.0).collect()
  }

  /// `true` when every weight is in `[0, 1]` and they sum to one.
  pub fn is_on_simplex(&self) -> bool {
    let sum: f64 = self.weights.iter().sum();
    (sum - 1.0).abs() < WEIGHT_TOLERANCE
      && self
        .weights
        .iter()
        .all(|&w| (0.0..=1.0).contains(&w))
  }

  /// `true` when both return and volatility are finite.
  pub fn is_finite(&self) -> bool {
    self.expected_return.is_finite() && self.volatility.is_finite()
  }
}

/// A portfolio drawn as part of a sampled frontier.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrontierPoint {
  pub portfolio: Portfolio,
}

impl FrontierPoint {
  pub fn volatility(&self) -> f64 {
    self.portfolio.volatility()
  }

  pub fn expected_return(&self) -> f64 {
    self.portfolio.expected_return()
  }

  pub fn weights(&self) -> &[f64] {
    self.portfolio.weights()
  }
}

impl From<Portfolio> for FrontierPoint {
  fn from(portfolio: Portfolio) -> Self {
    Self { portfolio }
  }
}
