//! # Errors
//!
//! Every failure is terminal for the request that produced it; nothing here is
//! retried because each kind stems from a deterministic property of the input.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = PortfolioError> = std::result::Result<T, E>;

/// Errors raised while loading series, estimating moments or optimizing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  /// A row, header, label or timestamp ordering is unusable.
  #[error("malformed price data for '{asset}': {reason}")]
  MalformedInput { asset: String, reason: String },

  /// The aligned series share too few timestamps to produce two returns.
  #[error("price data did not overlap in time: {common} common timestamps, need at least {required}")]
  InsufficientOverlap { common: usize, required: usize },

  /// Wrong number of assets for the requested path.
  #[error("expected between {min} and {max} assets, got {actual}")]
  AssetCountOutOfRange {
    min: usize,
    max: usize,
    actual: usize,
  },

  /// An asset's return series has (numerically) zero variance.
  #[error("return series of '{asset}' has zero variance")]
  DegenerateVariance { asset: String },

  /// Frontier sampling produced no finite portfolio.
  #[error("no usable portfolios in the candidate set")]
  EmptyCandidateSet,

  /// A control parameter or config value is outside its valid range.
  #[error("invalid value for '{name}': {value} (expected {expected})")]
  InvalidControl {
    name: &'static str,
    value: f64,
    expected: &'static str,
  },
}

impl PortfolioError {
  pub(crate) fn malformed(asset: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::MalformedInput {
      asset: asset.into(),
      reason: reason.into(),
    }
  }

  /// Stable machine-readable code for the calling layer.
  pub fn code(&self) -> &'static str {
    match self {
      Self::MalformedInput { .. } => "malformed_input",
      Self::InsufficientOverlap { .. } => "insufficient_overlap",
      Self::AssetCountOutOfRange { .. } => "asset_count_out_of_range",
      Self::DegenerateVariance { .. } => "degenerate_variance",
      Self::EmptyCandidateSet => "empty_candidate_set",
      Self::InvalidControl { .. } => "invalid_control",
    }
  }
}

/// Check that a unit-interval control (`riskFactor`, `alpha`) is finite and in `[0, 1]`.
pub(crate) fn check_unit_interval(name: &'static str, value: f64) -> Result<f64> {
  if value.is_finite() && (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(PortfolioError::InvalidControl {
      name,
      value,
      expected: "a number in [0, 1]",
    })
  }
}
