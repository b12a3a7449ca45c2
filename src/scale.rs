//! Price-per-bar (PPB) scaling
//!
//! PPB is the vertical price distance a 1x1 fan line travels per bar.

use crate::error::{GannError, Result};
use crate::pivot::Pivot;
use crate::series::PriceSeries;
use crate::volatility::{realized_volatility_pct, VolatilityEstimator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lower clamp on realized / ATR volatility in dynamic mode
pub const ADAPTIVE_FACTOR_MIN: f64 = 0.5;

/// Upper clamp on realized / ATR volatility in dynamic mode
pub const ADAPTIVE_FACTOR_MAX: f64 = 2.0;

/// Configuration-level selector for [`PpbMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PpbModeKind {
    Fixed,
    #[default]
    Atr,
    Dynamic,
}

impl fmt::Display for PpbModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PpbModeKind::Fixed => f.write_str("fixed"),
            PpbModeKind::Atr => f.write_str("atr"),
            PpbModeKind::Dynamic => f.write_str("dynamic"),
        }
    }
}

impl FromStr for PpbModeKind {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(PpbModeKind::Fixed),
            "atr" | "static" => Ok(PpbModeKind::Atr),
            "dynamic" | "adaptive" => Ok(PpbModeKind::Dynamic),
            other => Err(GannError::config(format!(
                "ppb_mode must be 'fixed', 'atr' or 'dynamic', got '{}'",
                other
            ))),
        }
    }
}

/// How PPB is derived
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PpbMode {
    /// Caller-supplied constant
    Fixed { ppb: f64 },
    /// `ATR[pivot] / atr_divisor`
    Static { atr_divisor: f64 },
    /// ATR% at the pivot scaled by realized volatility, converted back to price
    Dynamic {
        base_divisor: f64,
        volatility_window: usize,
    },
}

/// Computes PPB for a pivot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleCalculator {
    mode: PpbMode,
    estimator: Option<VolatilityEstimator>,
}

impl ScaleCalculator {
    /// Validate `mode`; `estimator` supplies the ATR and is required by the
    /// static and dynamic modes
    pub fn new(mode: PpbMode, estimator: Option<VolatilityEstimator>) -> Result<Self> {
        if estimator.is_none() && !matches!(mode, PpbMode::Fixed { .. }) {
            return Err(GannError::config(format!(
                "{:?} price per bar requires an ATR estimator",
                mode
            )));
        }
        match mode {
            PpbMode::Fixed { ppb } => positive("fixed_ppb", ppb)?,
            PpbMode::Static { atr_divisor } => positive("atr_divisor", atr_divisor)?,
            PpbMode::Dynamic {
                base_divisor,
                volatility_window,
            } => {
                positive("base_divisor", base_divisor)?;
                if volatility_window < 2 {
                    return Err(GannError::config(format!(
                        "volatility_window must be >= 2, got {}",
                        volatility_window
                    )));
                }
            }
        }
        Ok(Self { mode, estimator })
    }

    pub fn mode(&self) -> &PpbMode {
        &self.mode
    }

    fn atr_estimator(&self) -> Result<VolatilityEstimator> {
        self.estimator
            .ok_or_else(|| GannError::config("ATR estimator not configured"))
    }

    /// PPB for a fan anchored at `pivot`; always finite and > 0 on success
    pub fn compute(&self, series: &PriceSeries, pivot: &Pivot) -> Result<f64> {
        let ppb = match self.mode {
            PpbMode::Fixed { ppb } => ppb,
            PpbMode::Static { atr_divisor } => {
                let estimator = self.atr_estimator()?;
                let atr = estimator.atr_at(series, pivot.index)?;
                if atr <= 0.0 {
                    return Err(GannError::undefined(
                        estimator.to_string(),
                        pivot.index,
                        "ATR is zero, price per bar would not be positive",
                    ));
                }
                atr / atr_divisor
            }
            PpbMode::Dynamic {
                base_divisor,
                volatility_window,
            } => self.dynamic(series, pivot, base_divisor, volatility_window)?,
        };

        if !(ppb > 0.0 && ppb.is_finite()) {
            return Err(GannError::undefined(
                "price per bar",
                pivot.index,
                format!("computed value {} is not a positive finite number", ppb),
            ));
        }
        Ok(ppb)
    }

    fn dynamic(
        &self,
        series: &PriceSeries,
        pivot: &Pivot,
        base_divisor: f64,
        volatility_window: usize,
    ) -> Result<f64> {
        let estimator = self.atr_estimator()?;
        let atr_pct = estimator.atr_percent_at(series, pivot.index)?;
        if atr_pct <= 0.0 {
            return Err(GannError::undefined(
                format!("{} percent", estimator),
                pivot.index,
                "ATR% is zero, adaptive factor would divide by zero",
            ));
        }

        let realized = realized_volatility_pct(series, pivot.index, volatility_window)?;
        let factor = adaptive_factor(realized, atr_pct);
        let ppb_pct = atr_pct / base_divisor * factor;

        log::debug!(
            "Dynamic PPB at bar {}: ATR%={:.4}, realized={:.4}, factor={:.4}",
            pivot.index,
            atr_pct,
            realized,
            factor
        );

        Ok(ppb_pct / 100.0 * pivot.price)
    }
}

/// `realized / atr_pct` clamped to `[ADAPTIVE_FACTOR_MIN, ADAPTIVE_FACTOR_MAX]`
pub fn adaptive_factor(realized_pct: f64, atr_pct: f64) -> f64 {
    (realized_pct / atr_pct).clamp(ADAPTIVE_FACTOR_MIN, ADAPTIVE_FACTOR_MAX)
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GannError::config(format!("{} must be > 0, got {}", name, value)))
    }
}
