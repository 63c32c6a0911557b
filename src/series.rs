//! # Series Loading
//!
//! $$
//! \mathcal{T} = \bigcap_{i=1}^{N} \{t : (t, p) \in S_i\}
//! $$
//!
//! Parsing of per-asset `(timestamp, price)` tables and alignment of several
//! series on their common timestamps.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use ndarray::Array2;

use crate::error::PortfolioError;
use crate::error::Result;

/// Minimum number of common timestamps (two returns need three prices).
pub const MIN_OVERLAP: usize = 3;

const DATETIME_FORMATS: [&str; 4] = [
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M",
  "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATE_COLUMNS: [&str; 4] = ["date", "timestamp", "time", "datetime"];

const PRICE_COLUMNS: [&str; 4] = ["price", "close", "adj close", "adj_close"];

/// Parse a timestamp cell.
///
/// Accepts `YYYYMMDD`, unix seconds, RFC 3339, `YYYY-MM-DD[ HH:MM[:SS]]`,
/// `YYYY/MM/DD` and `MM/DD/YYYY`. Dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
  let s = raw.trim();
  if s.is_empty() {
    return None;
  }

  // Eight-digit cells are `YYYYMMDD` dates, not epoch seconds.
  if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
    return NaiveDate::parse_from_str(s, "%Y%m%d")
      .ok()
      .and_then(|d| d.and_hms_opt(0, 0, 0));
  }

  if let Ok(secs) = s.parse::<i64>() {
    return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
  }

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.naive_utc());
  }

  for fmt in DATETIME_FORMATS {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(dt);
    }
  }

  for fmt in DATE_FORMATS {
    if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
      return d.and_hms_opt(0, 0, 0);
    }
  }

  None
}

/// Validated price history of a single asset.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetSeries {
  label: String,
  timestamps: Vec<NaiveDateTime>,
  prices: Vec<f64>,
}

impl AssetSeries {
  /// Build a series, enforcing positive finite prices and strictly increasing timestamps.
  pub fn new(label: impl Into<String>, points: Vec<(NaiveDateTime, f64)>) -> Result<Self> {
    let label = label.into();
    if label.trim().is_empty() {
      return Err(PortfolioError::malformed(label, "asset label is empty"));
    }
    if points.is_empty() {
      return Err(PortfolioError::malformed(label, "no price rows"));
    }

    let mut timestamps = Vec::with_capacity(points.len());
    let mut prices = Vec::with_capacity(points.len());

    for (row, (ts, price)) in points.into_iter().enumerate() {
      if !price.is_finite() || price <= 0.0 {
        return Err(PortfolioError::malformed(
          label,
          format!("row {}: price {price} must be finite and positive", row + 1),
        ));
      }
      if let Some(prev) = timestamps.last() {
        if ts <= *prev {
          return Err(PortfolioError::malformed(
            label,
            format!("row {}: timestamp {ts} is not after {prev}", row + 1),
          ));
        }
      }
      timestamps.push(ts);
      prices.push(price);
    }

    Ok(Self {
      label,
      timestamps,
      prices,
    })
  }

  /// Build a series from unparsed timestamp cells.
  pub fn from_raw<S: AsRef<str>>(label: impl Into<String>, rows: &[(S, f64)]) -> Result<Self> {
    let label = label.into();
    let mut points = Vec::with_capacity(rows.len());

    for (row, (ts, price)) in rows.iter().enumerate() {
      let ts = ts.as_ref();
      let parsed = parse_timestamp(ts).ok_or_else(|| {
        PortfolioError::malformed(
          label.as_str(),
          format!("row {}: unrecognised timestamp '{ts}'", row + 1),
        )
      })?;
      points.push((parsed, *price));
    }

    Self::new(label, points)
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn timestamps(&self) -> &[NaiveDateTime] {
    &self.timestamps
  }

  pub fn prices(&self) -> &[f64] {
    &self.prices
  }

  pub fn len(&self) -> usize {
    self.prices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.prices.is_empty()
  }

  fn price_at(&self, ts: &NaiveDateTime) -> Option<f64> {
    self
      .timestamps
      .binary_search(ts)
      .ok()
      .map(|idx| self.prices[idx])
  }
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
  let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
  candidates
    .iter()
    .find_map(|c| lowered.iter().position(|h| h == c))
}

/// Parse a CSV table with a header row into an [`AssetSeries`].
///
/// The date column is the first of `date`, `timestamp`, `time`, `datetime` and
/// the price column the first of `price`, `close`, `adj close`, matched
/// case-insensitively. Other columns are ignored.
pub fn parse_csv<R: Read>(label: impl Into<String>, reader: R) -> Result<AssetSeries> {
  let label = label.into();
  let mut rdr = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .flexible(true)
    .from_reader(reader);

  let headers = rdr
    .headers()
    .map_err(|e| PortfolioError::malformed(label.as_str(), format!("unreadable header: {e}")))?
    .clone();

  let date_col = find_column(&headers, &DATE_COLUMNS)
    .ok_or_else(|| PortfolioError::malformed(label.as_str(), "missing date column"))?;
  let price_col = find_column(&headers, &PRICE_COLUMNS)
    .ok_or_else(|| PortfolioError::malformed(label.as_str(), "missing price column"))?;

  let mut points = Vec::new();
  for record in rdr.records() {
    let record =
      record.map_err(|e| PortfolioError::malformed(label.as_str(), format!("unreadable row: {e}")))?;
    let line = record.position().map(|p| p.line()).unwrap_or(0);

    let ts_cell = record.get(date_col).unwrap_or("");
    let ts = parse_timestamp(ts_cell).ok_or_else(|| {
      PortfolioError::malformed(
        label.as_str(),
        format!("line {line}: unrecognised timestamp '{ts_cell}'"),
      )
    })?;

    let price_cell = record.get(price_col).unwrap_or("");
    let price = price_cell.parse::<f64>().map_err(|_| {
      PortfolioError::malformed(
        label.as_str(),
        format!("line {line}: price '{price_cell}' is not numeric"),
      )
    })?;

    points.push((ts, price));
  }

  AssetSeries::new(label, points)
}

/// Read a CSV file; the label is the file stem.
pub fn load_csv_file<P: AsRef<Path>>(path: P) -> Result<AssetSeries> {
  let path = path.as_ref();
  let label = path
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("asset")
    .to_string();
  let file = std::fs::File::open(path)
    .map_err(|e| PortfolioError::malformed(label.as_str(), format!("{}: {e}", path.display())))?;
  parse_csv(label, file)
}

/// Fail with `AssetCountOutOfRange` unless `min <= actual <= max`.
pub fn check_asset_count(actual: usize, min: usize, max: usize) -> Result<()> {
  if (min..=max).contains(&actual) {
    Ok(())
  } else {
    Err(PortfolioError::AssetCountOutOfRange { min, max, actual })
  }
}

/// Load several CSV files after checking their count.
pub fn load_csv_files<P: AsRef<Path>>(paths: &[P], min: usize, max: usize) -> Result<Vec<AssetSeries>> {
  check_asset_count(paths.len(), min, max)?;
  paths.iter().map(load_csv_file).collect()
}

/// Prices of several assets restricted to their common timestamps.
#[derive(Clone, Debug)]
pub struct AlignedPrices {
  labels: Vec<String>,
  index: Vec<NaiveDateTime>,
  /// N×T price matrix, one row per asset.
  prices: Array2<f64>,
}

impl AlignedPrices {
  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn index(&self) -> &[NaiveDateTime] {
    &self.index
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  pub fn n_assets(&self) -> usize {
    self.labels.len()
  }
}

/// Align series on the intersection of their timestamps, ascending.
pub fn align(series: &[AssetSeries]) -> Result<AlignedPrices> {
  let mut seen = HashSet::with_capacity(series.len());
  for s in series {
    if !seen.insert(s.label()) {
      return Err(PortfolioError::malformed(s.label(), "duplicate asset label"));
    }
  }

  let Some(first) = series.first() else {
    return Err(PortfolioError::InsufficientOverlap {
      common: 0,
      required: MIN_OVERLAP,
    });
  };

  let index: Vec<NaiveDateTime> = first
    .timestamps()
    .iter()
    .filter(|ts| series[1..].iter().all(|s| s.timestamps().binary_search(*ts).is_ok()))
    .copied()
    .collect();

  if index.len() < MIN_OVERLAP {
    return Err(PortfolioError::InsufficientOverlap {
      common: index.len(),
      required: MIN_OVERLAP,
    });
  }

  let mut prices = Array2::<f64>::zeros((series.len(), index.len()));
  for (i, s) in series.iter().enumerate() {
    for (t, ts) in index.iter().enumerate() {
      // Present by construction of the intersection.
      prices[[i, t]] = s.price_at(ts).unwrap_or(f64::NAN);
    }
  }

  Ok(AlignedPrices {
    labels: series.iter().map(|s| s.label().to_string()).collect(),
    index,
    prices,
  })
}
