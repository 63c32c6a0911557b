//! # Portfolio Selection
//!
//! $$
//! \mathbf{w}_\alpha=\arg\max_{\mathbf{w}\in\mathcal{C}} \ \alpha\,\tilde\mu_p-(1-\alpha)\,\tilde\sigma_p,
//! \qquad \tilde x=\frac{x-\min_{\mathcal C} x}{\max_{\mathcal C} x-\min_{\mathcal C} x}
//! $$
//!
//! Picks the minimum-volatility, maximum-return and tradeoff portfolios out of a
//! candidate set. The result does not depend on candidate order.

use std::cmp::Ordering;

use serde::Serialize;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::error::check_unit_interval;
use crate::optimizers::TIE_EPSILON;
use crate::types::FrontierPoint;
use crate::types::Portfolio;

/// The three named portfolios of a frontier.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Selection {
  pub minimum_volatility: Portfolio,
  pub maximum_return: Portfolio,
  pub tradeoff: Portfolio,
}

/// Tradeoff scores closer than `TIE_EPSILON` compare equal; the extremes
/// compare their metrics exactly.
fn cmp_eps(a: f64, b: f64) -> Ordering {
  if (a - b).abs() <= TIE_EPSILON {
    Ordering::Equal
  } else {
    a.total_cmp(&b)
  }
}

/// Lexicographic "is `a` strictly better than `b`", falling back to the
/// weights so equal-metric candidates resolve the same way in any order.
fn prefer(primary: Ordering, secondary: Ordering, a: &FrontierPoint, b: &FrontierPoint) -> bool {
  match primary.then(secondary) {
    Ordering::Greater => true,
    Ordering::Less => false,
    Ordering::Equal => {
      let by_weights = a
        .weights()
        .iter()
        .zip(b.weights())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal);
      by_weights == Ordering::Greater
    }
  }
}

fn normalizer(values: impl Iterator<Item = f64>) -> impl Fn(f64) -> f64 {
  let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
    (lo.min(v), hi.max(v))
  });
  let range = hi - lo;
  move |v| if range > 0.0 { (v - lo) / range } else { 0.0 }
}

/// Select the three named portfolios from `candidates` with preference `alpha ∈ [0, 1]`.
pub fn select(candidates: &[FrontierPoint], alpha: f64) -> Result<Selection> {
  let alpha = check_unit_interval("alpha", alpha)?;
  let Some(first) = candidates.first() else {
    return Err(PortfolioError::EmptyCandidateSet);
  };

  let norm_ret = normalizer(candidates.iter().map(|p| p.expected_return()));
  let norm_vol = normalizer(candidates.iter().map(|p| p.volatility()));
  let score = |p: &FrontierPoint| {
    alpha * norm_ret(p.expected_return()) - (1.0 - alpha) * norm_vol(p.volatility())
  };

  let mut min_vol = first;
  let mut max_ret = first;
  let mut tradeoff = first;
  let mut tradeoff_score = score(first);

  for p in &candidates[1..] {
    // Lower volatility, then higher return.
    if prefer(
      min_vol.volatility().total_cmp(&p.volatility()),
      p.expected_return().total_cmp(&min_vol.expected_return()),
      p,
      min_vol,
    ) {
      min_vol = p;
    }

    // Higher return, then lower volatility.
    if prefer(
      p.expected_return().total_cmp(&max_ret.expected_return()),
      max_ret.volatility().total_cmp(&p.volatility()),
      p,
      max_ret,
    ) {
      max_ret = p;
    }

    // Higher score, then lower volatility.
    let s = score(p);
    if prefer(
      cmp_eps(s, tradeoff_score),
      cmp_eps(tradeoff.volatility(), p.volatility()),
      p,
      tradeoff,
    ) {
      tradeoff = p;
      tradeoff_score = s;
    }
  }

  Ok(Selection {
    minimum_volatility: min_vol.portfolio.clone(),
    maximum_return: max_ret.portfolio.clone(),
    tradeoff: tradeoff.portfolio.clone(),
  })
}
