//! # Portfolio Engine
//!
//! $$
//! \text{request}\ \to\ (\mu,\Sigma)\ \to\ \mathbf{w}^\*
//! $$
//!
//! Request-level orchestration of both optimization paths: validation, loading,
//! estimation, optimization and response shaping.

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::MAX_ASSETS;
use crate::MIN_ASSETS;
use crate::api::EngineRequest;
use crate::api::EngineResponse;
use crate::api::FrontierRequest;
use crate::api::FrontierResponse;
use crate::api::GraphPoint;
use crate::api::Predictions;
use crate::api::SectorValues;
use crate::api::TwoAssetRequest;
use crate::api::TwoAssetResponse;
use crate::api::round2;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::error::check_unit_interval;
use crate::estimator::Moments;
use crate::estimator::ReturnMatrix;
use crate::estimator::moving_average_tail;
use crate::frontier::FrontierConfig;
use crate::frontier::sample_frontier;
use crate::optimizers::TwoAssetConfig;
use crate::optimizers::optimize_two_asset;
use crate::optimizers::two_asset_curve;
use crate::selector::select;
use crate::series::AlignedPrices;
use crate::series::AssetSeries;
use crate::series::align;
use crate::series::check_asset_count;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Periods per year used to annualize moments (252 for daily prices, 1 to keep periodic rates).
  pub periods_per_year: f64,
  /// Moving-average window for price predictions.
  pub prediction_window: usize,
  /// Number of trailing moving-average values reported per asset.
  pub prediction_horizon: usize,
  pub two_asset: TwoAssetConfig,
  pub frontier: FrontierConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      periods_per_year: 252.0,
      prediction_window: 5,
      prediction_horizon: 10,
      two_asset: TwoAssetConfig::default(),
      frontier: FrontierConfig::default(),
    }
  }
}

impl EngineConfig {
  /// Load a JSON config; missing fields keep their defaults.
  pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let config: Self = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
      return Err(PortfolioError::InvalidControl {
        name: "periods_per_year",
        value: self.periods_per_year,
        expected: "a positive number",
      });
    }
    if self.prediction_window == 0 {
      return Err(PortfolioError::InvalidControl {
        name: "prediction_window",
        value: 0.0,
        expected: "at least 1",
      });
    }
    self.two_asset.validate()?;
    self.frontier.validate()
  }
}

/// Single entry point for the two-asset and frontier workflows.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: EngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Align series and estimate annualized moments.
  pub fn estimate(&self, series: &[AssetSeries]) -> Result<(AlignedPrices, Moments)> {
    let aligned = align(series)?;
    let returns = ReturnMatrix::from_aligned(&aligned)?;
    let moments = Moments::estimate(&returns).annualized(self.config.periods_per_year);
    tracing::debug!(
      assets = aligned.n_assets(),
      periods = returns.n_periods(),
      correlation = %moments.correlation(),
      "estimated moments"
    );
    Ok((aligned, moments))
  }

  /// Optimal two-asset allocation with chart data and price predictions.
  #[tracing::instrument(skip_all, fields(sector1 = %request.sector1, sector2 = %request.sector2, risk_factor = request.risk_factor))]
  pub fn optimize_two_asset(&self, request: &TwoAssetRequest) -> Result<TwoAssetResponse> {
    self.config.validate()?;
    let risk_factor = check_unit_interval("riskFactor", request.risk_factor)?;
    let series = request.series()?;

    let (aligned, moments) = self.estimate(&series)?;
    let portfolio = optimize_two_asset(&moments, risk_factor, &self.config.two_asset)?;
    let w1 = portfolio.weights()[0];

    let graph_data = two_asset_curve(&moments, self.config.two_asset.curve_points)
      .into_iter()
      .map(|(w, ret, vol)| GraphPoint {
        name: format!("Portfolio {}", (w * 100.0) as i64),
        values: vec![
          (request.sector1.clone(), ret * 100.0),
          (request.sector2.clone(), vol * 100.0),
        ],
      })
      .collect();

    let prices = aligned.prices();
    let predict = |row: usize| {
      let row = prices.row(row).to_vec();
      moving_average_tail(
        &row,
        self.config.prediction_window,
        self.config.prediction_horizon,
      )
    };

    tracing::info!(
      weight1 = w1,
      expected_return = portfolio.expected_return(),
      volatility = portfolio.volatility(),
      "two-asset optimization done"
    );

    Ok(TwoAssetResponse {
      optimal_weights: SectorValues::percentages(w1),
      expected_returns: SectorValues {
        sector1: moments.mean()[0],
        sector2: moments.mean()[1],
      },
      predictions: Predictions {
        sector1: predict(0),
        sector2: predict(1),
      },
      portfolio,
      graph_data,
    })
  }

  /// Sampled frontier and the three named portfolios.
  #[tracing::instrument(skip_all, fields(assets = request.files.len(), alpha = request.alpha))]
  pub fn efficient_frontier(&self, request: &FrontierRequest) -> Result<FrontierResponse> {
    self.config.validate()?;
    check_asset_count(request.files.len(), MIN_ASSETS, MAX_ASSETS)?;
    let alpha = check_unit_interval("alpha", request.alpha)?;
    let series = request.series()?;

    let (_, moments) = self.estimate(&series)?;
    let frontier = sample_frontier(&moments, &self.config.frontier)?;
    let selection = select(frontier.points(), alpha)?;

    tracing::info!(
      points = frontier.len(),
      efficient = frontier.efficient_subset().len(),
      min_vol = selection.minimum_volatility.volatility(),
      max_ret = selection.maximum_return.expected_return(),
      "frontier optimization done"
    );

    Ok(FrontierResponse {
      efficient_frontier: frontier.into_points(),
      minimum_volatility_portfolio: selection.minimum_volatility,
      maximum_return_portfolio: selection.maximum_return,
      tradeoff_portfolio: selection.tradeoff,
    })
  }

  /// Dispatch a tagged request.
  pub fn handle(&self, request: &EngineRequest) -> Result<EngineResponse> {
    match request {
      EngineRequest::TwoAsset(r) => self.optimize_two_asset(r).map(EngineResponse::TwoAsset),
      EngineRequest::Frontier(r) => self.efficient_frontier(r).map(EngineResponse::Frontier),
    }
  }
}

/// Percent-formatted `(return, volatility)` for display.
pub fn format_rates(ret: f64, vol: f64) -> (f64, f64) {
  (round2(ret * 100.0), round2(vol * 100.0))
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use crate::api::PricePoint;
  use crate::api::SeriesInput;
  use super::*;

  fn rows(prices: &[f64]) -> Vec<PricePoint> {
    prices
      .iter()
      .enumerate()
      .map(|(i, &p)| PricePoint::new(format!("2024-01-{:02}", i + 1), p))
      .collect()
  }

  fn prices(seed: f64, n: usize) -> Vec<f64> {
    let mut p = 100.0;
    (0..n)
      .map(|i| {
        p *= 1.0 + 0.01 * ((i as f64 * seed).sin());
        p
      })
      .collect()
  }

  fn two_asset_request(risk_factor: f64) -> TwoAssetRequest {
    TwoAssetRequest {
      sector1: "Tech".into(),
      sector2: "Energy".into(),
      series1: rows(&prices(1.3, 25)),
      series2: rows(&prices(0.7, 25)),
      risk_factor,
    }
  }

  fn frontier_request(n: usize, alpha: f64) -> FrontierRequest {
    FrontierRequest {
      files: (0..n)
        .map(|i| SeriesInput {
          label: format!("S{i}"),
          series: rows(&prices(0.5 + i as f64 * 0.37, 25)),
        })
        .collect(),
      alpha,
    }
  }

  fn small_engine() -> PortfolioEngine {
    PortfolioEngine::new(EngineConfig {
      frontier: FrontierConfig {
        samples: 2_000,
        ..FrontierConfig::default()
      },
      ..EngineConfig::default()
    })
  }

  #[test]
  #[traced_test]
  fn two_asset_response_shape() {
    let resp = small_engine().optimize_two_asset(&two_asset_request(0.4)).unwrap();

    let total = resp.optimal_weights.sector1 + resp.optimal_weights.sector2;
    assert!((total - 100.0).abs() <= 0.01);
    assert!(resp.portfolio.is_on_simplex());
    assert_eq!(resp.graph_data.len(), 50);
    assert_eq!(resp.graph_data[0].name, "Portfolio 0");
    assert_eq!(resp.graph_data[49].name, "Portfolio 100");
    assert_eq!(resp.predictions.sector1.len(), 10);
    assert!(logs_contain("two-asset optimization done"));
    assert!(logs_contain("correlation=[[1"));
  }

  #[test]
  fn two_asset_rejects_out_of_range_risk_factor() {
    let err = small_engine()
      .optimize_two_asset(&two_asset_request(-0.1))
      .unwrap_err();
    assert_eq!(err.code(), "invalid_control");
  }

  #[test]
  #[traced_test]
  fn frontier_logs_envelope_size() {
    small_engine()
      .efficient_frontier(&frontier_request(3, 0.5))
      .unwrap();
    assert!(logs_contain("frontier optimization done"));
    assert!(logs_contain("efficient="));
  }

  #[test]
  fn frontier_response_is_consistent() {
    let resp = small_engine()
      .efficient_frontier(&frontier_request(4, 0.5))
      .unwrap();

    assert_eq!(resp.efficient_frontier.len(), 2_000);
    for p in &resp.efficient_frontier {
      assert!(p.portfolio.is_on_simplex());
      assert!(resp.minimum_volatility_portfolio.volatility() <= p.volatility());
      assert!(resp.maximum_return_portfolio.expected_return() >= p.expected_return());
    }
  }

  #[test]
  fn frontier_asset_count_bounds() {
    let engine = small_engine();
    for n in [1, 7] {
      let err = engine.efficient_frontier(&frontier_request(n, 0.5)).unwrap_err();
      assert_eq!(
        err,
        PortfolioError::AssetCountOutOfRange {
          min: 2,
          max: 6,
          actual: n
        }
      );
    }
    assert!(engine.efficient_frontier(&frontier_request(6, 0.5)).is_ok());
  }

  #[test]
  fn non_overlapping_series_are_reported() {
    let mut req = frontier_request(2, 0.5);
    req.files[1].series = req.files[1]
      .series
      .iter()
      .map(|p| PricePoint::new(p.timestamp.replace("2024", "2023"), p.price))
      .collect();

    let err = small_engine().efficient_frontier(&req).unwrap_err();
    assert_eq!(err.code(), "insufficient_overlap");
  }

  #[test]
  fn config_validation() {
    let cfg = EngineConfig {
      periods_per_year: 0.0,
      ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
    assert!(EngineConfig::default().validate().is_ok());

    let parsed: EngineConfig =
      serde_json::from_str(r#"{"periods_per_year": 12, "frontier": {"samples": 500}}"#).unwrap();
    assert_eq!(parsed.periods_per_year, 12.0);
    assert_eq!(parsed.frontier.samples, 500);
    assert_eq!(parsed.frontier.seed, 42);
    assert_eq!(parsed.two_asset.grid_points, 1001);
  }

  #[test]
  fn handle_dispatches_by_type() {
    let engine = small_engine();
    let resp = engine
      .handle(&EngineRequest::Frontier(frontier_request(3, 0.2)))
      .unwrap();
    assert!(matches!(resp, EngineResponse::Frontier(_)));
  }
}
