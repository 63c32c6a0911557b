//! # Two-Asset Optimizer
//!
//! $$
//! w_1^\*=\arg\max_{w_1\in[0,1]} \ \lambda\,\mu_p(w_1)-(1-\lambda)\,\sigma_p(w_1)
//! $$
//!
//! Deterministic grid search over the single free weight, with the closed-form
//! minimum-variance solution for `λ = 0`.

use serde::Deserialize;
use serde::Serialize;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::error::check_unit_interval;
use crate::estimator::Moments;
use crate::series::check_asset_count;
use crate::types::Portfolio;

/// Objective values closer than this are treated as equal.
pub const TIE_EPSILON: f64 = 1e-12;

/// Runtime configuration for [`optimize_two_asset`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoAssetConfig {
  /// Number of evenly spaced `w1` values in `[0, 1]`, endpoints included.
  pub grid_points: usize,
  /// Number of `w1` values in the chart curve.
  pub curve_points: usize,
}

impl Default for TwoAssetConfig {
  fn default() -> Self {
    Self {
      grid_points: 1001,
      curve_points: 50,
    }
  }
}

impl TwoAssetConfig {
  pub fn validate(&self) -> Result<()> {
    if self.grid_points < 2 {
      return Err(PortfolioError::InvalidControl {
        name: "grid_points",
        value: self.grid_points as f64,
        expected: "at least 2",
      });
    }
    if self.curve_points < 2 {
      return Err(PortfolioError::InvalidControl {
        name: "curve_points",
        value: self.curve_points as f64,
        expected: "at least 2",
      });
    }
    Ok(())
  }
}

fn objective(moments: &Moments, w1: f64, risk_factor: f64) -> f64 {
  let w = [w1, 1.0 - w1];
  risk_factor * moments.expected_return(&w) - (1.0 - risk_factor) * moments.volatility(&w)
}

/// Closed-form long-only minimum-variance weight of the first asset.
///
/// `w1 = (σ2² − σ12) / (σ1² + σ2² − 2σ12)`, clamped to `[0, 1]`.
pub fn min_variance_weight(moments: &Moments) -> Result<f64> {
  check_asset_count(moments.n_assets(), 2, 2)?;
  moments.ensure_non_degenerate()?;

  let cov = moments.covariance();
  let (v1, v2, c12) = (cov[[0, 0]], cov[[1, 1]], cov[[0, 1]]);
  let denom = v1 + v2 - 2.0 * c12;

  // Perfectly correlated equal-variance assets: every mix has the same risk.
  if denom.abs() <= f64::EPSILON * (v1 + v2) {
    return Err(PortfolioError::DegenerateVariance {
      asset: format!("{} - {}", moments.labels()[0], moments.labels()[1]),
    });
  }

  Ok(((v2 - c12) / denom).clamp(0.0, 1.0))
}

/// Grid search for the best `w1`; ties prefer the weight closest to 0.5.
pub fn grid_search_weight(moments: &Moments, risk_factor: f64, grid_points: usize) -> f64 {
  let last = (grid_points.max(2) - 1) as f64;
  let mut best_w: f64 = 0.5;
  let mut best_obj = f64::NEG_INFINITY;

  for i in 0..=last as usize {
    let w1 = i as f64 / last;
    let obj = objective(moments, w1, risk_factor);
    if !obj.is_finite() {
      continue;
    }

    let better = obj > best_obj + TIE_EPSILON;
    let tied = (obj - best_obj).abs() <= TIE_EPSILON;
    if better || (tied && (w1 - 0.5).abs() < (best_w - 0.5).abs()) {
      best_w = w1;
      best_obj = obj;
    }
  }

  best_w
}

/// Optimal long-only two-asset portfolio for risk factor `λ ∈ [0, 1]`.
pub fn optimize_two_asset(
  moments: &Moments,
  risk_factor: f64,
  config: &TwoAssetConfig,
) -> Result<Portfolio> {
  check_asset_count(moments.n_assets(), 2, 2)?;
  let risk_factor = check_unit_interval("riskFactor", risk_factor)?;
  config.validate()?;

  let w1 = if risk_factor == 0.0 {
    match min_variance_weight(moments) {
      Ok(w1) => w1,
      Err(err) => {
        tracing::debug!(%err, "closed-form minimum variance unavailable, using grid");
        grid_search_weight(moments, risk_factor, config.grid_points)
      }
    }
  } else {
    grid_search_weight(moments, risk_factor, config.grid_points)
  };

  Ok(moments.portfolio(vec![w1, 1.0 - w1]))
}

/// `(w1, return, volatility)` for `points` evenly spaced weights of the first asset.
pub fn two_asset_curve(moments: &Moments, points: usize) -> Vec<(f64, f64, f64)> {
  let last = (points.max(2) - 1) as f64;
  (0..=last as usize)
    .map(|i| {
      let w1 = i as f64 / last;
      let w = [w1, 1.0 - w1];
      (w1, moments.expected_return(&w), moments.volatility(&w))
    })
    .collect()
}
