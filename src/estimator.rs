//! # Return Estimation
//!
//! $$
//! r_{i,t}=\frac{p_{i,t}}{p_{i,t-1}}-1,\qquad
//! \Sigma_{ij}=\frac{1}{T-1}\sum_{t}(r_{i,t}-\bar r_i)(r_{j,t}-\bar r_j)
//! $$
//!
//! Simple returns, sample mean vector and sample covariance matrix.

use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;

use crate::MAX_ASSETS;
use crate::MIN_ASSETS;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::series::AlignedPrices;
use crate::series::AssetSeries;
use crate::series::MIN_OVERLAP;
use crate::series::align;
use crate::series::check_asset_count;
use crate::types::Portfolio;

/// Variances at or below this are treated as zero.
pub const DEGENERATE_VARIANCE: f64 = 1e-18;

/// Convert prices to simple periodic returns.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
  prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Trailing simple moving average of `prices`, keeping the last `horizon`
/// full-window values rounded to two decimals.
pub fn moving_average_tail(prices: &[f64], window: usize, horizon: usize) -> Vec<f64> {
  if window == 0 || prices.len() < window {
    return Vec::new();
  }

  let averages: Vec<f64> = prices
    .windows(window)
    .map(|w| w.iter().sum::<f64>() / window as f64)
    .collect();
  let start = averages.len().saturating_sub(horizon);
  averages[start..]
    .iter()
    .map(|v| (v * 100.0).round() / 100.0)
    .collect()
}

/// N×T matrix of periodic returns with its timestamp index.
#[derive(Clone, Debug)]
pub struct ReturnMatrix {
  labels: Vec<String>,
  index: Vec<NaiveDateTime>,
  returns: Array2<f64>,
}

impl ReturnMatrix {
  /// Build returns from aligned prices; needs at least two assets and two returns.
  pub fn from_aligned(aligned: &AlignedPrices) -> Result<Self> {
    let prices = aligned.prices();
    let (n, len) = prices.dim();
    check_asset_count(n, MIN_ASSETS, MAX_ASSETS)?;
    if len < MIN_OVERLAP {
      return Err(PortfolioError::InsufficientOverlap {
        common: len,
        required: MIN_OVERLAP,
      });
    }

    let mut returns = Array2::<f64>::zeros((n, len - 1));
    for (i, mut row) in returns.outer_iter_mut().enumerate() {
      let r = simple_returns(&prices.row(i).to_vec());
      row.assign(&ArrayView1::from(&r[..]));
    }

    Ok(Self {
      labels: aligned.labels().to_vec(),
      index: aligned.index()[1..].to_vec(),
      returns,
    })
  }

  /// Build returns from equally long price rows indexed by consecutive periods.
  pub fn from_price_rows(labels: &[&str], rows: &[Vec<f64>]) -> Result<Self> {
    let origin = NaiveDate::from_ymd_opt(1970, 1, 1)
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .unwrap_or_default();

    let series = labels
      .iter()
      .zip(rows.iter())
      .map(|(label, row)| {
        let points = row
          .iter()
          .enumerate()
          .map(|(t, &p)| (origin + Duration::days(t as i64), p))
          .collect();
        AssetSeries::new(*label, points)
      })
      .collect::<Result<Vec<_>>>()?;

    Self::from_aligned(&align(&series)?)
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  /// Timestamp of each return (the later price of each pair).
  pub fn index(&self) -> &[NaiveDateTime] {
    &self.index
  }

  pub fn returns(&self) -> &Array2<f64> {
    &self.returns
  }

  pub fn n_assets(&self) -> usize {
    self.returns.nrows()
  }

  pub fn n_periods(&self) -> usize {
    self.returns.ncols()
  }
}

/// Expected-return vector and covariance matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Moments {
  labels: Vec<String>,
  mean: Array1<f64>,
  cov: Array2<f64>,
}

impl Moments {
  /// Sample mean and sample covariance (T-1 denominator) of a return matrix.
  pub fn estimate(returns: &ReturnMatrix) -> Self {
    let r = returns.returns();
    let (n, t) = r.dim();
    let mean = r.mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(n));
    let centered = r - &mean.view().insert_axis(Axis(1));
    let denom = (t - 1) as f64;

    let mut cov = Array2::<f64>::zeros((n, n));
    for i in 0..n {
      for j in i..n {
        let c = centered.row(i).dot(&centered.row(j)) / denom;
        cov[[i, j]] = c;
        cov[[j, i]] = c;
      }
    }

    Self {
      labels: returns.labels().to_vec(),
      mean,
      cov,
    }
  }

  /// Moments from known inputs; `cov` must be square, symmetric and match `mean`.
  pub fn from_parts(labels: Vec<String>, mean: Array1<f64>, cov: Array2<f64>) -> Result<Self> {
    let n = mean.len();
    if labels.len() != n || cov.dim() != (n, n) {
      return Err(PortfolioError::malformed(
        "moments",
        format!(
          "{} labels, {} means and a {:?} covariance matrix do not match",
          labels.len(),
          n,
          cov.dim()
        ),
      ));
    }
    for i in 0..n {
      if cov[[i, i]] < 0.0 {
        return Err(PortfolioError::malformed(
          labels[i].as_str(),
          "negative variance on the covariance diagonal",
        ));
      }
      for j in (i + 1)..n {
        if cov[[i, j]] != cov[[j, i]] {
          return Err(PortfolioError::malformed("moments", "covariance matrix is not symmetric"));
        }
      }
    }

    Ok(Self { labels, mean, cov })
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn mean(&self) -> &Array1<f64> {
    &self.mean
  }

  pub fn covariance(&self) -> &Array2<f64> {
    &self.cov
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Scale periodic moments to a yearly horizon (`k = 252` for daily prices).
  pub fn annualized(&self, periods_per_year: f64) -> Self {
    Self {
      labels: self.labels.clone(),
      mean: &self.mean * periods_per_year,
      cov: &self.cov * periods_per_year,
    }
  }

  /// Fail with `DegenerateVariance` if any asset has zero variance.
  pub fn ensure_non_degenerate(&self) -> Result<()> {
    match self
      .cov
      .diag()
      .iter()
      .position(|&v| v <= DEGENERATE_VARIANCE)
    {
      Some(i) => Err(PortfolioError::DegenerateVariance {
        asset: self.labels[i].clone(),
      }),
      None => Ok(()),
    }
  }

  /// Pearson correlation implied by the covariance; zero-variance assets get zero off-diagonal terms.
  pub fn correlation(&self) -> Array2<f64> {
    let n = self.n_assets();
    let sd: Vec<f64> = self.cov.diag().iter().map(|v| v.max(0.0).sqrt()).collect();
    let mut corr = Array2::<f64>::zeros((n, n));

    for i in 0..n {
      for j in 0..n {
        let denom = sd[i] * sd[j];
        corr[[i, j]] = if i == j {
          1.0
        } else if denom > 1e-15 {
          (self.cov[[i, j]] / denom).clamp(-1.0, 1.0)
        } else {
          0.0
        };
      }
    }

    corr
  }

  /// `wᵀμ`.
  pub fn expected_return(&self, weights: &[f64]) -> f64 {
    self.mean.dot(&ArrayView1::from(weights))
  }

  /// `sqrt(wᵀΣw)`; tiny negative round-off is clamped to zero.
  pub fn volatility(&self, weights: &[f64]) -> f64 {
    let w = ArrayView1::from(weights);
    w.dot(&self.cov.dot(&w)).max(0.0).sqrt()
  }

  /// Evaluate a weight vector.
  pub fn portfolio(&self, weights: Vec<f64>) -> Portfolio {
    let expected_return = self.expected_return(&weights);
    let volatility = self.volatility(&weights);
    Portfolio::new(weights, expected_return, volatility)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn simple_returns_are_not_log_returns() {
    let r = simple_returns(&[100.0, 110.0, 99.0]);
    assert_relative_eq!(r[0], 0.10, epsilon = 1e-12);
    assert_relative_eq!(r[1], -0.10, epsilon = 1e-12);
  }

  #[test]
  fn constant_growth_scenario_has_zero_covariance() {
    let rm = ReturnMatrix::from_price_rows(
      &["A", "B"],
      &[vec![100.0, 110.0, 121.0], vec![100.0, 105.0, 110.25]],
    )
    .unwrap();

    assert_eq!(rm.n_periods(), 2);
    assert_abs_diff_eq!(rm.returns()[[0, 0]], 0.10, epsilon = 1e-12);
    assert_abs_diff_eq!(rm.returns()[[0, 1]], 0.10, epsilon = 1e-12);
    assert_abs_diff_eq!(rm.returns()[[1, 0]], 0.05, epsilon = 1e-12);
    assert_abs_diff_eq!(rm.returns()[[1, 1]], 0.05, epsilon = 1e-12);

    let m = Moments::estimate(&rm);
    assert_abs_diff_eq!(m.mean()[0], 0.10, epsilon = 1e-12);
    assert_abs_diff_eq!(m.mean()[1], 0.05, epsilon = 1e-12);
    for v in m.covariance().iter() {
      assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
    }

    assert_eq!(
      m.ensure_non_degenerate(),
      Err(PortfolioError::DegenerateVariance {
        asset: "A".to_string()
      })
    );
  }

  #[test]
  fn identical_series_are_perfectly_correlated() {
    let prices = vec![100.0, 103.0, 101.0, 106.0, 104.5];
    let rm = ReturnMatrix::from_price_rows(&["A", "B"], &[prices.clone(), prices]).unwrap();
    let m = Moments::estimate(&rm);
    let cov = m.covariance();

    assert_eq!(cov[[0, 0]], cov[[1, 1]]);
    assert_eq!(cov[[0, 1]], cov[[0, 0]]);
    assert_relative_eq!(m.correlation()[[0, 1]], 1.0, epsilon = 1e-12);
  }

  #[test]
  fn covariance_is_exactly_symmetric_and_sample_based() {
    let rm = ReturnMatrix::from_price_rows(
      &["A", "B", "C"],
      &[
        vec![10.0, 10.4, 10.1, 10.9, 11.3, 10.7],
        vec![50.0, 49.0, 51.5, 50.2, 52.0, 53.1],
        vec![7.0, 7.1, 7.05, 6.9, 7.3, 7.2],
      ],
    )
    .unwrap();
    let m = Moments::estimate(&rm);
    let cov = m.covariance();

    for i in 0..3 {
      for j in 0..3 {
        assert_eq!(cov[[i, j]], cov[[j, i]]);
      }
    }

    let r0 = rm.returns().row(0).to_vec();
    let mean0 = r0.iter().sum::<f64>() / r0.len() as f64;
    let var0 = r0.iter().map(|x| (x - mean0).powi(2)).sum::<f64>() / (r0.len() - 1) as f64;
    assert_relative_eq!(cov[[0, 0]], var0, epsilon = 1e-15);
  }

  #[test]
  fn single_asset_is_rejected() {
    let err = ReturnMatrix::from_price_rows(&["A"], &[vec![1.0, 2.0, 3.0]]).unwrap_err();
    assert_eq!(err.code(), "asset_count_out_of_range");
  }

  #[test]
  fn portfolio_metrics_match_hand_computation() {
    let m = Moments::from_parts(
      vec!["A".into(), "B".into()],
      array![0.08, 0.12],
      array![[0.04, 0.006], [0.006, 0.09]],
    )
    .unwrap();

    let p = m.portfolio(vec![0.6, 0.4]);
    assert_relative_eq!(p.expected_return(), 0.096, epsilon = 1e-12);
    let var = 0.36 * 0.04 + 0.16 * 0.09 + 2.0 * 0.24 * 0.006;
    assert_relative_eq!(p.volatility(), f64::sqrt(var), epsilon = 1e-12);
    assert!(p.is_on_simplex());
  }

  #[test]
  fn annualization_scales_without_mutating() {
    let m = Moments::from_parts(
      vec!["A".into(), "B".into()],
      array![0.001, 0.002],
      array![[0.0001, 0.0], [0.0, 0.0004]],
    )
    .unwrap();
    let a = m.annualized(252.0);

    assert_relative_eq!(a.mean()[0], 0.252, epsilon = 1e-12);
    assert_relative_eq!(a.covariance()[[1, 1]], 0.1008, epsilon = 1e-12);
    assert_eq!(m.mean()[0], 0.001);
  }

  #[test]
  fn returns_matrix_rows_match_simple_returns() {
    let a = vec![10.0, 10.4, 10.1, 10.9];
    let b = vec![50.0, 49.0, 51.5, 50.2];
    let rm = ReturnMatrix::from_price_rows(&["A", "B"], &[a.clone(), b.clone()]).unwrap();
    assert_eq!(rm.returns().row(0).to_vec(), simple_returns(&a));
    assert_eq!(rm.returns().row(1).to_vec(), simple_returns(&b));
  }

  #[test]
  fn covariance_from_volatilities_must_be_mirrored() {
    let vol = [0.12, 0.17, 0.22, 0.27, 0.32, 0.37];
    let labels: Vec<String> = (0..6).map(|i| format!("A{i}")).collect();
    let mean = Array1::from_elem(6, 0.05);

    let mirrored = Array2::from_shape_fn((6, 6), |(i, j)| {
      let rho = if i == j { 1.0 } else { 0.3 };
      rho * vol[i.min(j)] * vol[i.max(j)]
    });
    assert!(Moments::from_parts(labels.clone(), mean.clone(), mirrored).is_ok());

    let mut skewed = Array2::from_shape_fn((6, 6), |(i, j)| if i == j { 0.04 } else { 0.01 });
    skewed[[0, 1]] = f64::from_bits(0.01f64.to_bits() + 1);
    assert!(Moments::from_parts(labels, mean, skewed).is_err());
  }

  #[test]
  fn from_parts_rejects_asymmetric_covariance() {
    let err = Moments::from_parts(
      vec!["A".into(), "B".into()],
      array![0.1, 0.2],
      array![[0.04, 0.01], [0.02, 0.09]],
    )
    .unwrap_err();
    assert_eq!(err.code(), "malformed_input");
  }

  #[test]
  fn moving_average_tail_keeps_last_values() {
    let prices: Vec<f64> = (1..=20).map(|x| x as f64).collect();
    let ma = moving_average_tail(&prices, 5, 10);
    assert_eq!(ma.len(), 10);
    assert_eq!(ma[0], 9.0);
    assert_eq!(ma[9], 18.0);
    assert!(moving_average_tail(&prices[..3], 5, 10).is_empty());
  }
}
