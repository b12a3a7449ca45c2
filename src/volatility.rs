//! Volatility estimation: true range, ATR and realized volatility
//!
//! True range at bar 0 has no previous close and is taken as `high - low`.
//! Every ATR variant, the pivot detector and the scale calculator read true
//! range through [`true_range`], so that convention holds crate-wide.
//!
//! All ATR variants are undefined (NaN) before index `length - 1`; Wilder and
//! EMA are seeded with the SMA of the first `length` true ranges. A series
//! shorter than `length + 1` bars produces an all-NaN vector.

use crate::error::{GannError, Result};
use crate::series::PriceSeries;
use crate::smoothing::{smooth, SmoothingMethod};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::str::FromStr;

/// Unit in which volatility thresholds are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityModel {
    /// Absolute ATR, same unit as price
    #[default]
    Classic,
    /// ATR as a percentage of close, comparable across assets
    Adaptive,
}

impl fmt::Display for VolatilityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityModel::Classic => f.write_str("classic"),
            VolatilityModel::Adaptive => f.write_str("adaptive"),
        }
    }
}

impl FromStr for VolatilityModel {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(VolatilityModel::Classic),
            "adaptive" => Ok(VolatilityModel::Adaptive),
            other => Err(GannError::config(format!(
                "volatility_model must be 'classic' or 'adaptive', got '{}'",
                other
            ))),
        }
    }
}

/// True range per bar, `TR[0] = high[0] - low[0]`
pub fn true_range(series: &PriceSeries) -> Vec<f64> {
    let mut prev_close = None;
    series
        .bars()
        .iter()
        .map(|bar| {
            let tr = bar.true_range(prev_close);
            prev_close = Some(bar.close);
            tr
        })
        .collect()
}

/// Average True Range estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityEstimator {
    length: usize,
    method: SmoothingMethod,
}

impl VolatilityEstimator {
    /// Create an estimator; `length` must be at least 2
    pub fn new(length: usize, method: SmoothingMethod) -> Result<Self> {
        if length < 2 {
            return Err(GannError::config(format!(
                "atr_len must be >= 2, got {}",
                length
            )));
        }
        Ok(Self { length, method })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn method(&self) -> SmoothingMethod {
        self.method
    }

    /// First index at which the ATR is defined
    pub fn first_defined_index(&self) -> usize {
        self.length - 1
    }

    /// Minimum series length for any ATR value to be produced
    pub fn min_bars(&self) -> usize {
        self.length + 1
    }

    /// Fail unless the series is long enough to produce ATR values
    pub fn require_series(&self, series: &PriceSeries) -> Result<()> {
        series.require_len(self.min_bars(), &self.to_string())
    }

    /// Absolute ATR per bar
    pub fn atr(&self, series: &PriceSeries) -> Vec<f64> {
        if series.len() < self.min_bars() {
            return vec![f64::NAN; series.len()];
        }
        smooth(self.method, self.length, &true_range(series))
    }

    /// ATR as a percentage of the bar's close
    pub fn atr_percent(&self, series: &PriceSeries) -> Vec<f64> {
        self.atr(series)
            .into_iter()
            .zip(series.bars())
            .map(|(atr, bar)| to_percent(atr, bar.close))
            .collect()
    }

    /// Absolute ATR at `index`, failing if the series is too short or the
    /// index sits in the warm-up window
    pub fn atr_at(&self, series: &PriceSeries, index: usize) -> Result<f64> {
        self.require_series(series)?;
        check_index(series, index)?;

        let value = self.atr(series)[index];
        if value.is_nan() {
            return Err(GannError::undefined(
                self.to_string(),
                index,
                format!(
                    "index falls inside the warm-up window (first defined index is {})",
                    self.first_defined_index()
                ),
            ));
        }
        Ok(value)
    }

    /// Percentage ATR at `index`
    pub fn atr_percent_at(&self, series: &PriceSeries, index: usize) -> Result<f64> {
        let atr = self.atr_at(series, index)?;
        let close = series.bars()[index].close;
        let pct = to_percent(atr, close);
        if pct.is_nan() {
            return Err(GannError::undefined(
                format!("{} percent", self),
                index,
                format!("close is {}", close),
            ));
        }
        Ok(pct)
    }
}

impl fmt::Display for VolatilityEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ATR({}, {})", self.length, self.method)
    }
}

fn to_percent(atr: f64, close: f64) -> f64 {
    if close == 0.0 || !close.is_finite() {
        f64::NAN
    } else {
        100.0 * atr / close
    }
}

fn check_index(series: &PriceSeries, index: usize) -> Result<()> {
    if index >= series.len() {
        return Err(GannError::config(format!(
            "index {} out of range [0, {}]",
            index,
            series.len().saturating_sub(1)
        )));
    }
    Ok(())
}

/// Realized volatility in percent over the `window` log returns ending at `end`.
///
/// Uses closes `end - window ..= end`; population standard deviation of the
/// log returns, scaled by `sqrt(window)`.
pub fn realized_volatility_pct(series: &PriceSeries, end: usize, window: usize) -> Result<f64> {
    if window < 2 {
        return Err(GannError::config(format!(
            "volatility_window must be >= 2, got {}",
            window
        )));
    }
    check_index(series, end)?;
    if end < window {
        return Err(GannError::InsufficientData {
            context: format!("realized volatility window of {} returns ending at bar {}", window, end),
            required: window + 1,
            available: end + 1,
        });
    }

    let closes = &series.bars()[end - window..=end];
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|pair| (pair[1].close / pair[0].close).ln())
        .collect();

    let realized = returns.iter().population_std_dev() * (window as f64).sqrt() * 100.0;
    if !realized.is_finite() {
        return Err(GannError::undefined(
            "realized volatility",
            end,
            "log returns are not finite (non-positive closes in window)",
        ));
    }
    Ok(realized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> PriceSeries {
        PriceSeries::from_hlc(
            &[88700.0, 89500.0, 89000.0, 90000.0, 90300.0],
            &[88400.0, 89000.0, 88600.0, 89600.0, 89900.0],
            &[88500.0, 89200.0, 88800.0, 89800.0, 90100.0],
        )
        .unwrap()
    }

    #[test]
    fn test_true_range() {
        let tr = true_range(&sample());
        assert_eq!(tr, vec![300.0, 1000.0, 600.0, 1200.0, 500.0]);
    }

    #[test]
    fn test_atr_sma() {
        let est = VolatilityEstimator::new(3, SmoothingMethod::Sma).unwrap();
        let atr = est.atr(&sample());

        assert!(atr[0].is_nan());
        assert!(atr[1].is_nan());
        assert_relative_eq!(atr[2], 633.333333, epsilon = 1e-4);
        assert_relative_eq!(atr[3], 933.333333, epsilon = 1e-4);
        assert_relative_eq!(atr[4], 766.666667, epsilon = 1e-4);
    }

    #[test]
    fn test_atr_wilder() {
        let est = VolatilityEstimator::new(3, SmoothingMethod::Wilder).unwrap();
        let atr = est.atr(&sample());

        assert!(atr[1].is_nan());
        assert_relative_eq!(atr[2], 633.333333, epsilon = 1e-4);
        let expected = 633.333333 + (1200.0 - 633.333333) / 3.0;
        assert_relative_eq!(atr[3], expected, epsilon = 1e-4);
    }

    #[test]
    fn test_atr_percent() {
        let est = VolatilityEstimator::new(3, SmoothingMethod::Sma).unwrap();
        let pct = est.atr_percent(&sample());

        assert!(pct[0].is_nan());
        assert_relative_eq!(pct[2], 100.0 * 633.333333 / 88800.0, epsilon = 1e-6);
    }

    #[test]
    fn test_atr_percent_zero_close() {
        let series =
            PriceSeries::from_hlc(&[2.0, 2.0, 2.0, 2.0], &[1.0, 1.0, 1.0, 1.0], &[1.5, 1.5, 0.0, 1.5])
                .unwrap();
        let est = VolatilityEstimator::new(2, SmoothingMethod::Sma).unwrap();

        let pct = est.atr_percent(&series);
        assert!(pct[2].is_nan());
        assert!(pct[3].is_finite());
        assert!(matches!(
            est.atr_percent_at(&series, 2),
            Err(GannError::UndefinedValue { index: 2, .. })
        ));
    }

    #[test]
    fn test_short_series_all_undefined() {
        let est = VolatilityEstimator::new(14, SmoothingMethod::Ema).unwrap();
        let atr = est.atr(&sample());

        assert_eq!(atr.len(), 5);
        assert!(atr.iter().all(|v| v.is_nan()));
        assert!(matches!(
            est.atr_at(&sample(), 4),
            Err(GannError::InsufficientData {
                required: 15,
                available: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_atr_at_warmup_is_undefined() {
        let est = VolatilityEstimator::new(3, SmoothingMethod::Sma).unwrap();
        let err = est.atr_at(&sample(), 1).unwrap_err();

        assert!(matches!(err, GannError::UndefinedValue { index: 1, .. }));
        assert!(err.to_string().contains("warm-up"));
    }

    #[test]
    fn test_invalid_length() {
        assert!(matches!(
            VolatilityEstimator::new(1, SmoothingMethod::Sma),
            Err(GannError::ConfigError(_))
        ));
    }

    #[test]
    fn test_realized_volatility() {
        // Alternating +/- r log returns: population std is exactly r
        let r: f64 = 0.01;
        let mut closes = vec![100.0];
        for i in 0..10 {
            let last = *closes.last().unwrap();
            let step = if i % 2 == 0 { r } else { -r };
            closes.push(last * step.exp());
        }
        let series = PriceSeries::from_hlc(&closes, &closes, &closes).unwrap();

        let rv = realized_volatility_pct(&series, 10, 10).unwrap();
        assert_relative_eq!(rv, r * 10f64.sqrt() * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_realized_volatility_insufficient() {
        let err = realized_volatility_pct(&sample(), 3, 4).unwrap_err();
        match err {
            GannError::InsufficientData {
                required,
                available,
                ..
            } => {
                assert_eq!(required, 5);
                assert_eq!(available, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
