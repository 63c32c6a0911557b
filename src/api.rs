//! # Wire Types
//!
//! Request and response shapes exchanged with the calling layer. Transport,
//! multipart decoding and chart rendering live outside this crate.

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::series::AssetSeries;
use crate::types::FrontierPoint;
use crate::types::Portfolio;

fn default_control() -> f64 {
  0.5
}

/// Round to two decimals.
pub fn round2(v: f64) -> f64 {
  (v * 100.0).round() / 100.0
}

/// One `(timestamp, price)` row as sent by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
  pub timestamp: String,
  pub price: f64,
}

impl PricePoint {
  pub fn new(timestamp: impl Into<String>, price: f64) -> Self {
    Self {
      timestamp: timestamp.into(),
      price,
    }
  }
}

fn to_series(label: &str, rows: &[PricePoint]) -> Result<AssetSeries> {
  let rows: Vec<(&str, f64)> = rows
    .iter()
    .map(|p| (p.timestamp.as_str(), p.price))
    .collect();
  AssetSeries::from_raw(label, &rows)
}

/// Two-asset optimization request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoAssetRequest {
  pub sector1: String,
  pub sector2: String,
  pub series1: Vec<PricePoint>,
  pub series2: Vec<PricePoint>,
  #[serde(default = "default_control")]
  pub risk_factor: f64,
}

/// Key holding the row label in `graphData`; sector labels may not reuse it.
pub const GRAPH_NAME_KEY: &str = "name";

impl TwoAssetRequest {
  /// Validated series for both sectors.
  pub fn series(&self) -> Result<Vec<AssetSeries>> {
    for label in [&self.sector1, &self.sector2] {
      if label.trim() == GRAPH_NAME_KEY {
        return Err(PortfolioError::malformed(
          label.as_str(),
          format!("sector label '{GRAPH_NAME_KEY}' is reserved for chart rows"),
        ));
      }
    }
    Ok(vec![
      to_series(&self.sector1, &self.series1)?,
      to_series(&self.sector2, &self.series2)?,
    ])
  }
}

/// One uploaded price table of a frontier request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesInput {
  /// Empty labels default to `Asset_<position>`.
  #[serde(default)]
  pub label: String,
  pub series: Vec<PricePoint>,
}

/// Efficient-frontier request for two to six assets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontierRequest {
  pub files: Vec<SeriesInput>,
  #[serde(default = "default_control")]
  pub alpha: f64,
}

impl FrontierRequest {
  /// Validated series, one per file.
  pub fn series(&self) -> Result<Vec<AssetSeries>> {
    self
      .files
      .iter()
      .enumerate()
      .map(|(i, f)| {
        if f.label.trim().is_empty() {
          to_series(&format!("Asset_{}", i + 1), &f.series)
        } else {
          to_series(&f.label, &f.series)
        }
      })
      .collect()
  }
}

/// Either request shape, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineRequest {
  TwoAsset(TwoAssetRequest),
  Frontier(FrontierRequest),
}

/// A pair of values keyed by the literal `sector1` / `sector2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorValues {
  pub sector1: f64,
  pub sector2: f64,
}

impl SectorValues {
  /// Percent weights rounded to cents; the second is derived from the first so
  /// the pair sums to 100.
  pub fn percentages(w1: f64) -> Self {
    let sector1 = round2(w1 * 100.0);
    Self {
      sector1,
      sector2: round2(100.0 - sector1),
    }
  }
}

/// Moving-average price outlook per sector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
  pub sector1: Vec<f64>,
  pub sector2: Vec<f64>,
}

/// One chart row: a name plus one value per series label.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphPoint {
  pub name: String,
  pub values: Vec<(String, f64)>,
}

impl Serialize for GraphPoint {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
    map.serialize_entry(GRAPH_NAME_KEY, &self.name)?;
    for (key, value) in &self.values {
      map.serialize_entry(key, value)?;
    }
    map.end()
  }
}

/// Two-asset optimization result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoAssetResponse {
  /// Percent allocation, summing to 100.
  pub optimal_weights: SectorValues,
  /// Fractional expected return per sector.
  pub expected_returns: SectorValues,
  pub portfolio: Portfolio,
  pub predictions: Predictions,
  /// Return (%) of `sector1` and volatility (%) under `sector2`, per mix.
  pub graph_data: Vec<GraphPoint>,
}

/// Frontier result with fractional rates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrontierResponse {
  pub efficient_frontier: Vec<FrontierPoint>,
  pub minimum_volatility_portfolio: Portfolio,
  pub maximum_return_portfolio: Portfolio,
  pub tradeoff_portfolio: Portfolio,
}

/// Either response shape.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EngineResponse {
  TwoAsset(TwoAssetResponse),
  Frontier(FrontierResponse),
}

/// Error payload with a stable code and a human-readable message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
  pub error: String,
  pub details: String,
}

impl From<&PortfolioError> for ErrorResponse {
  fn from(err: &PortfolioError) -> Self {
    Self {
      error: err.code().to_string(),
      details: err.to_string(),
    }
  }
}
