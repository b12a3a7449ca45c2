//! Pivot detection
//!
//! Both threshold models share one forward scan holding two candidates, the
//! lowest price since the last confirmation and the highest. On each bar the
//! low candidate is checked first: a rise from it that meets or exceeds the
//! threshold confirms it as a low pivot. The high candidate is checked second:
//! a fall that meets or exceeds the threshold confirms a high pivot. Any
//! confirmation restarts both candidates at the current bar.

use crate::error::{GannError, Result};
use crate::series::{PriceSeries, PriceSource};
use crate::smoothing::SmoothingMethod;
use crate::types::Price;
use crate::volatility::{VolatilityEstimator, VolatilityModel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a pivot is a local low or a local high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    Low,
    High,
}

impl fmt::Display for PivotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotKind::Low => f.write_str("low"),
            PivotKind::High => f.write_str("high"),
        }
    }
}

impl FromStr for PivotKind {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(PivotKind::Low),
            "high" => Ok(PivotKind::High),
            other => Err(GannError::config(format!(
                "pivot kind must be 'low' or 'high', got '{}'",
                other
            ))),
        }
    }
}

/// A confirmed local extremum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub price: Price,
    pub kind: PivotKind,
}

impl Pivot {
    pub fn new(index: usize, price: Price, kind: PivotKind) -> Self {
        Self { index, price, kind }
    }
}

/// How relative price moves are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceScale {
    /// `(to - from) / from`
    #[default]
    Linear,
    /// `exp(ln(to) - ln(from)) - 1`; a doubling and a halving have equal magnitude
    Logarithmic,
}

impl PriceScale {
    /// Relative rise from `from` to `to`
    pub fn up_move(self, from: Price, to: Price) -> f64 {
        match self {
            PriceScale::Linear => (to - from) / from,
            PriceScale::Logarithmic => (to.ln() - from.ln()).exp() - 1.0,
        }
    }

    /// Relative fall from `from` to `to`, positive when price dropped
    pub fn down_move(self, from: Price, to: Price) -> f64 {
        match self {
            PriceScale::Linear => (from - to) / from,
            PriceScale::Logarithmic => (from.ln() - to.ln()).exp() - 1.0,
        }
    }
}

impl fmt::Display for PriceScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceScale::Linear => f.write_str("linear"),
            PriceScale::Logarithmic => f.write_str("logarithmic"),
        }
    }
}

impl FromStr for PriceScale {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(PriceScale::Linear),
            "log" | "logarithmic" => Ok(PriceScale::Logarithmic),
            other => Err(GannError::config(format!(
                "price_scale must be 'linear' or 'logarithmic', got '{}'",
                other
            ))),
        }
    }
}

/// Threshold model for confirming pivots
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PivotMode {
    /// Fixed relative move, e.g. 0.05 = 5%
    Percent { threshold: f64 },
    /// Move measured against `ATR * multiplier`
    Atr {
        estimator: VolatilityEstimator,
        multiplier: f64,
        model: VolatilityModel,
    },
}

impl PivotMode {
    pub fn percent(threshold: f64) -> Self {
        PivotMode::Percent { threshold }
    }

    pub fn atr(
        length: usize,
        multiplier: f64,
        method: SmoothingMethod,
        model: VolatilityModel,
    ) -> Result<Self> {
        Ok(PivotMode::Atr {
            estimator: VolatilityEstimator::new(length, method)?,
            multiplier,
            model,
        })
    }
}

impl fmt::Display for PivotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotMode::Percent { threshold } => write!(f, "percent threshold {}", threshold),
            PivotMode::Atr {
                estimator,
                multiplier,
                model,
            } => write!(f, "{} x {} ({})", estimator, multiplier, model),
        }
    }
}

/// Detected pivots, each list in ascending index order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotSet {
    pub lows: Vec<Pivot>,
    pub highs: Vec<Pivot>,
}

impl PivotSet {
    pub fn last_low(&self) -> Option<Pivot> {
        self.lows.last().copied()
    }

    pub fn last_high(&self) -> Option<Pivot> {
        self.highs.last().copied()
    }

    pub fn last(&self, kind: PivotKind) -> Option<Pivot> {
        match kind {
            PivotKind::Low => self.last_low(),
            PivotKind::High => self.last_high(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lows.is_empty() && self.highs.is_empty()
    }
}

/// Confirmation bound at one bar
#[derive(Debug, Clone, Copy)]
enum Bound {
    /// Relative move, measured with the detector's price scale
    Relative(f64),
    /// Absolute move in price units
    Absolute(f64),
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    price: Price,
}

/// Scans a price series for local lows and highs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotDetector {
    mode: PivotMode,
    scale: PriceScale,
    source: PriceSource,
}

impl PivotDetector {
    /// Create a detector on the linear scale reading closes
    pub fn new(mode: PivotMode) -> Result<Self> {
        match mode {
            PivotMode::Percent { threshold } => {
                if !(threshold > 0.0 && threshold.is_finite()) {
                    return Err(GannError::config(format!(
                        "threshold must be > 0, got {}",
                        threshold
                    )));
                }
            }
            PivotMode::Atr { multiplier, .. } => {
                if !(multiplier > 0.0 && multiplier.is_finite()) {
                    return Err(GannError::config(format!(
                        "atr_mult must be > 0, got {}",
                        multiplier
                    )));
                }
            }
        }

        Ok(Self {
            mode,
            scale: PriceScale::Linear,
            source: PriceSource::Close,
        })
    }

    pub fn with_scale(mut self, scale: PriceScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_price_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn mode(&self) -> &PivotMode {
        &self.mode
    }

    /// Human-readable description of the threshold model, used in errors
    pub fn describe(&self) -> String {
        match self.mode {
            PivotMode::Atr {
                model: VolatilityModel::Classic,
                ..
            } => format!("{} on {} prices", self.mode, self.source),
            _ => format!("{} on {} {} prices", self.mode, self.scale, self.source),
        }
    }

    /// Run the scan and return every confirmed pivot
    pub fn detect(&self, series: &PriceSeries) -> Result<PivotSet> {
        let prices = series.prices(self.source);

        match self.mode {
            PivotMode::Percent { threshold } => {
                self.check_prices(&prices, true)?;
                Ok(self.scan(&prices, 0, |_| Some(Bound::Relative(threshold))))
            }
            PivotMode::Atr {
                estimator,
                multiplier,
                model,
            } => {
                estimator.require_series(series)?;
                let start = estimator.first_defined_index();
                match model {
                    VolatilityModel::Classic => {
                        self.check_prices(&prices, false)?;
                        let atr = estimator.atr(series);
                        Ok(self.scan(&prices, start, |t| {
                            defined(atr[t]).map(|v| Bound::Absolute(v * multiplier))
                        }))
                    }
                    VolatilityModel::Adaptive => {
                        self.check_prices(&prices, true)?;
                        let atr_pct = estimator.atr_percent(series);
                        Ok(self.scan(&prices, start, |t| {
                            defined(atr_pct[t]).map(|v| Bound::Relative(v / 100.0 * multiplier))
                        }))
                    }
                }
            }
        }
    }

    fn check_prices(&self, prices: &[Price], relative: bool) -> Result<()> {
        for (i, &p) in prices.iter().enumerate() {
            if !p.is_finite() || (relative && p <= 0.0) {
                return Err(GannError::DataError(format!(
                    "Pivot detection on {} requires finite{} prices; bar {} has {}",
                    self.source,
                    if relative { ", positive" } else { "" },
                    i,
                    p
                )));
            }
        }
        Ok(())
    }

    fn scan<F>(&self, prices: &[Price], start: usize, bound_at: F) -> PivotSet
    where
        F: Fn(usize) -> Option<Bound>,
    {
        let mut pivots = PivotSet::default();
        if prices.len() <= start {
            return pivots;
        }

        let mut low = Candidate {
            index: start,
            price: prices[start],
        };
        let mut high = low;

        for (t, &price) in prices.iter().enumerate().skip(start + 1) {
            let Some(bound) = bound_at(t) else {
                continue;
            };
            let current = Candidate { index: t, price };

            if self.rise(low.price, price, bound) {
                pivots.lows.push(Pivot::new(low.index, low.price, PivotKind::Low));
                low = current;
                high = current;
            } else if price < low.price {
                low = current;
            }

            if self.fall(high.price, price, bound) {
                pivots.highs.push(Pivot::new(high.index, high.price, PivotKind::High));
                low = current;
                high = current;
            } else if price > high.price {
                high = current;
            }
        }

        pivots
    }

    fn rise(&self, from: Price, to: Price, bound: Bound) -> bool {
        match bound {
            Bound::Relative(threshold) => self.scale.up_move(from, to) >= threshold,
            Bound::Absolute(threshold) => to - from >= threshold,
        }
    }

    fn fall(&self, from: Price, to: Price, bound: Bound) -> bool {
        match bound {
            Bound::Relative(threshold) => self.scale.down_move(from, to) >= threshold,
            Bound::Absolute(threshold) => from - to >= threshold,
        }
    }
}

/// A bound confirms only when strictly positive; NaN (warm-up) and zero
/// volatility leave the bar unscanned
fn defined(value: f64) -> Option<f64> {
    if value > 0.0 && value.is_finite() {
        Some(value)
    } else {
        None
    }
}
