use std::io::Write;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use portfolio_frontier::AssetSeries;
use portfolio_frontier::EngineConfig;
use portfolio_frontier::FrontierConfig;
use portfolio_frontier::PortfolioEngine;
use portfolio_frontier::PortfolioError;
use portfolio_frontier::api::EngineRequest;
use portfolio_frontier::api::EngineResponse;
use portfolio_frontier::api::ErrorResponse;
use portfolio_frontier::api::FrontierRequest;
use portfolio_frontier::api::PricePoint;
use portfolio_frontier::api::SeriesInput;
use portfolio_frontier::api::TwoAssetRequest;
use portfolio_frontier::series::load_csv_files;
use serde_json::json;
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, prices: &[f64]) -> PathBuf {
  let path = dir.path().join(format!("{name}.csv"));
  let mut f = std::fs::File::create(&path).unwrap();
  writeln!(f, "Date,Open,Close").unwrap();
  for (i, p) in prices.iter().enumerate() {
    writeln!(f, "2024-02-{:02},0,{p}", i + 1).unwrap();
  }
  path
}

fn geometric(start: f64, growth: f64, n: usize) -> Vec<f64> {
  (0..n).map(|t| start * (1.0 + growth).powi(t as i32)).collect()
}

fn noisy(start: f64, freq: f64, n: usize) -> Vec<f64> {
  let mut p = start;
  (0..n)
    .map(|t| {
      p *= 1.0 + 0.02 * (t as f64 * freq).cos();
      p
    })
    .collect()
}

fn points(series: &AssetSeries) -> Vec<PricePoint> {
  series
    .timestamps()
    .iter()
    .zip(series.prices())
    .map(|(ts, &p)| PricePoint::new(ts.to_string(), p))
    .collect()
}

fn engine(samples: usize) -> PortfolioEngine {
  PortfolioEngine::new(EngineConfig {
    frontier: FrontierConfig {
      samples,
      ..FrontierConfig::default()
    },
    ..EngineConfig::default()
  })
}

#[test]
fn csv_files_through_frontier() {
  let dir = TempDir::new().unwrap();
  let paths = vec![
    write_csv(&dir, "alpha", &noisy(50.0, 0.9, 28)),
    write_csv(&dir, "beta", &noisy(80.0, 1.7, 28)),
    write_csv(&dir, "gamma", &noisy(20.0, 2.3, 28)),
  ];
  let series = load_csv_files(&paths, 2, 6).unwrap();
  assert_eq!(series[1].label(), "beta");

  let request = FrontierRequest {
    files: series
      .iter()
      .map(|s| SeriesInput {
        label: s.label().to_string(),
        series: points(s),
      })
      .collect(),
    alpha: 0.5,
  };
  let resp = engine(3_000).efficient_frontier(&request).unwrap();

  assert_eq!(resp.efficient_frontier.len(), 3_000);
  for p in &resp.efficient_frontier {
    assert_eq!(p.weights().len(), 3);
    assert_abs_diff_eq!(p.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-6);
  }
  assert!(resp.tradeoff_portfolio.is_on_simplex());

  let again = engine(3_000).efficient_frontier(&request).unwrap();
  assert_eq!(resp, again);
}

#[test]
fn constant_growth_has_zero_volatility() {
  let a = AssetSeries::from_raw(
    "A",
    &[("2024-01-01", 100.0), ("2024-01-02", 110.0), ("2024-01-03", 121.0)],
  )
  .unwrap();
  let b = AssetSeries::from_raw(
    "B",
    &[("2024-01-01", 100.0), ("2024-01-02", 105.0), ("2024-01-03", 110.25)],
  )
  .unwrap();

  let resp = engine(1_000)
    .optimize_two_asset(&TwoAssetRequest {
      sector1: "A".into(),
      sector2: "B".into(),
      series1: points(&a),
      series2: points(&b),
      risk_factor: 0.5,
    })
    .unwrap();
  assert!(resp.portfolio.volatility() < 1e-9);
  assert_abs_diff_eq!(resp.optimal_weights.sector1, 100.0, epsilon = 1e-9);
  assert_abs_diff_eq!(resp.optimal_weights.sector2, 0.0, epsilon = 1e-9);
  assert_abs_diff_eq!(resp.expected_returns.sector1, 0.10 * 252.0, epsilon = 1e-9);

  let frontier = engine(1_000)
    .efficient_frontier(&FrontierRequest {
      files: vec![
        SeriesInput {
          label: "A".into(),
          series: points(&a),
        },
        SeriesInput {
          label: "B".into(),
          series: points(&b),
        },
      ],
      alpha: 0.5,
    })
    .unwrap();
  assert!(frontier
    .efficient_frontier
    .iter()
    .all(|p| p.volatility() < 1e-9));
}

#[test]
fn seven_files_are_rejected_before_parsing() {
  let dir = TempDir::new().unwrap();
  let paths: Vec<PathBuf> = (0..7)
    .map(|i| write_csv(&dir, &format!("s{i}"), &geometric(10.0, 0.01, 5)))
    .collect();
  assert_eq!(
    load_csv_files(&paths, 2, 6).unwrap_err(),
    PortfolioError::AssetCountOutOfRange {
      min: 2,
      max: 6,
      actual: 7
    }
  );
}

#[test]
fn json_request_round_trip() {
  let rows = |prices: Vec<f64>| {
    prices
      .iter()
      .enumerate()
      .map(|(i, p)| json!({"timestamp": format!("2024-03-{:02}", i + 1), "price": p}))
      .collect::<Vec<_>>()
  };
  let series1 = rows(noisy(50.0, 0.9, 30));
  let series2 = rows(noisy(30.0, 1.3, 30));
  let request: EngineRequest = serde_json::from_value(json!({
    "type": "two_asset",
    "sector1": "Tech",
    "sector2": "Utilities",
    "series1": series1,
    "series2": series2,
    "riskFactor": 0.3
  }))
  .unwrap();

  let resp = engine(1_000).handle(&request).unwrap();
  let value = serde_json::to_value(&resp).unwrap();

  assert!(matches!(resp, EngineResponse::TwoAsset(_)));
  let weights = &value["optimalWeights"];
  let total = weights["sector1"].as_f64().unwrap() + weights["sector2"].as_f64().unwrap();
  assert_abs_diff_eq!(total, 100.0, epsilon = 0.01);
  assert_eq!(value["graphData"].as_array().unwrap().len(), 50);
  assert!(value["graphData"][10]["Tech"].is_number());
  assert!(value["graphData"][10]["Utilities"].is_number());
  assert_eq!(value["predictions"]["sector2"].as_array().unwrap().len(), 10);
  assert!(value["portfolio"]["return"].is_number());
}

#[test]
fn errors_map_to_payloads() {
  let request = FrontierRequest {
    files: vec![SeriesInput {
      label: "only".into(),
      series: vec![PricePoint::new("2024-01-01", 1.0)],
    }],
    alpha: 0.5,
  };
  let err = engine(1_000).efficient_frontier(&request).unwrap_err();
  let payload = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
  assert_eq!(
    payload,
    json!({
      "error": "asset_count_out_of_range",
      "details": "expected between 2 and 6 assets, got 1"
    })
  );
}
