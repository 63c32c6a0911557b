//! # portfolio-frontier
//!
//! $$
//! \max_{\mathbf{w}\in\Delta^{N-1}} \ \alpha\,\mu^\top\mathbf{w} - (1-\alpha)\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}
//! $$
//!
//! Estimates return/risk from historical prices and builds long-only portfolios:
//! a grid-searched two-asset allocation and a Monte Carlo efficient frontier for
//! two to six assets.
//!
//! Pipeline: [`series`] → [`estimator`] → [`optimizers`] | [`frontier`] → [`selector`],
//! orchestrated per request by [`engine::PortfolioEngine`].
#![allow(clippy::needless_range_loop)]

pub mod api;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod frontier;
pub mod optimizers;
pub mod selector;
pub mod series;
pub mod types;

pub use engine::EngineConfig;
pub use engine::PortfolioEngine;
pub use error::PortfolioError;
pub use error::Result;
pub use estimator::Moments;
pub use estimator::ReturnMatrix;
pub use frontier::Frontier;
pub use frontier::FrontierConfig;
pub use optimizers::TwoAssetConfig;
pub use selector::Selection;
pub use series::AlignedPrices;
pub use series::AssetSeries;
pub use types::FrontierPoint;
pub use types::Portfolio;

/// Minimum number of assets on either optimization path.
pub const MIN_ASSETS: usize = 2;
/// Maximum number of assets accepted by the frontier path.
pub const MAX_ASSETS: usize = 6;
/// Weights must sum to one within this tolerance.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;
