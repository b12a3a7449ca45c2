//! Fan configuration surface
//!
//! [`FanConfig`] is the flat option set a CLI or config file maps onto. It
//! carries its own defaults; nothing is read from process-wide state.

use crate::error::{GannError, Result};
use crate::pivot::{PivotDetector, PivotKind, PivotMode, PriceScale};
use crate::scale::{PpbMode, PpbModeKind, ScaleCalculator};
use crate::series::PriceSource;
use crate::smoothing::SmoothingMethod;
use crate::volatility::{VolatilityEstimator, VolatilityModel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ratios of the classic fan: 1x8 through 8x1
pub const CLASSIC_RATIOS: [f64; 9] = [0.125, 0.25, 1.0 / 3.0, 0.5, 1.0, 2.0, 3.0, 4.0, 8.0];

/// Ratios of the adaptive fan (no 1x3 / 3x1)
pub const ADAPTIVE_RATIOS: [f64; 7] = [0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0];

/// Which pivot anchors the fan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotSource {
    #[default]
    LastLow,
    LastHigh,
    Custom,
}

impl fmt::Display for PivotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotSource::LastLow => f.write_str("last_low"),
            PivotSource::LastHigh => f.write_str("last_high"),
            PivotSource::Custom => f.write_str("custom"),
        }
    }
}

impl FromStr for PivotSource {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "last_low" => Ok(PivotSource::LastLow),
            "last_high" => Ok(PivotSource::LastHigh),
            "custom" => Ok(PivotSource::Custom),
            other => Err(GannError::config(format!(
                "pivot_source must be 'last_low', 'last_high' or 'custom', got '{}'",
                other
            ))),
        }
    }
}

/// Threshold model selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotModeKind {
    #[default]
    Atr,
    Percent,
}

impl fmt::Display for PivotModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotModeKind::Atr => f.write_str("atr"),
            PivotModeKind::Percent => f.write_str("percent"),
        }
    }
}

impl FromStr for PivotModeKind {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "atr" => Ok(PivotModeKind::Atr),
            "percent" => Ok(PivotModeKind::Percent),
            other => Err(GannError::config(format!(
                "pivot_mode must be 'atr' or 'percent', got '{}'",
                other
            ))),
        }
    }
}

/// Caller-supplied pivot. Without `kind` the direction is inferred from the
/// closes that follow it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomPivot {
    pub index: usize,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PivotKind>,
}

impl CustomPivot {
    pub fn new(index: usize, price: f64) -> Self {
        Self {
            index,
            price,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: PivotKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Every option recognised by the fan builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    pub pivot_source: PivotSource,
    pub pivot_mode: PivotModeKind,
    /// Relative threshold for percent mode (0.05 = 5%)
    pub threshold: f64,
    pub atr_len: usize,
    pub atr_mult: f64,
    pub atr_method: SmoothingMethod,
    pub volatility_model: VolatilityModel,
    pub price_scale: PriceScale,
    pub price_source: PriceSource,
    pub ppb_mode: PpbModeKind,
    /// Overrides `ppb_mode`: true selects dynamic, false downgrades dynamic to atr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_dynamic_ppb: Option<bool>,
    pub atr_divisor: f64,
    pub fixed_ppb: f64,
    pub base_divisor: f64,
    pub volatility_window: usize,
    pub ratios: Vec<f64>,
    pub bars_forward: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_pivot: Option<CustomPivot>,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            pivot_source: PivotSource::LastLow,
            pivot_mode: PivotModeKind::Atr,
            threshold: 0.05,
            atr_len: 14,
            atr_mult: 1.0,
            atr_method: SmoothingMethod::Sma,
            volatility_model: VolatilityModel::Classic,
            price_scale: PriceScale::Linear,
            price_source: PriceSource::Close,
            ppb_mode: PpbModeKind::Atr,
            use_dynamic_ppb: None,
            atr_divisor: 1.0,
            fixed_ppb: 1.0,
            base_divisor: 2.0,
            volatility_window: 50,
            ratios: CLASSIC_RATIOS.to_vec(),
            bars_forward: 100,
            custom_pivot: None,
        }
    }
}

impl FanConfig {
    /// Volatility-adaptive preset for assets with multiplicative price dynamics:
    /// EMA-smoothed ATR%, log-scale detection and dynamic PPB
    pub fn adaptive() -> Self {
        Self {
            atr_mult: 1.5,
            atr_method: SmoothingMethod::Ema,
            volatility_model: VolatilityModel::Adaptive,
            price_scale: PriceScale::Logarithmic,
            ppb_mode: PpbModeKind::Dynamic,
            ratios: ADAPTIVE_RATIOS.to_vec(),
            ..Self::default()
        }
    }

    /// Anchor the fan at a caller-supplied pivot
    pub fn with_custom_pivot(mut self, pivot: CustomPivot) -> Self {
        self.pivot_source = PivotSource::Custom;
        self.custom_pivot = Some(pivot);
        self
    }

    /// `ppb_mode` after applying the `use_dynamic_ppb` override
    pub fn effective_ppb_mode(&self) -> PpbModeKind {
        match (self.use_dynamic_ppb, self.ppb_mode) {
            (Some(true), _) => PpbModeKind::Dynamic,
            (Some(false), PpbModeKind::Dynamic) => PpbModeKind::Atr,
            (_, mode) => mode,
        }
    }

    pub fn estimator(&self) -> Result<VolatilityEstimator> {
        VolatilityEstimator::new(self.atr_len, self.atr_method)
    }

    pub fn pivot_mode(&self) -> Result<PivotMode> {
        match self.pivot_mode {
            PivotModeKind::Percent => Ok(PivotMode::percent(self.threshold)),
            PivotModeKind::Atr => PivotMode::atr(
                self.atr_len,
                self.atr_mult,
                self.atr_method,
                self.volatility_model,
            ),
        }
    }

    pub fn pivot_detector(&self) -> Result<PivotDetector> {
        Ok(PivotDetector::new(self.pivot_mode()?)?
            .with_scale(self.price_scale)
            .with_price_source(self.price_source))
    }

    pub fn ppb_mode(&self) -> PpbMode {
        match self.effective_ppb_mode() {
            PpbModeKind::Fixed => PpbMode::Fixed {
                ppb: self.fixed_ppb,
            },
            PpbModeKind::Atr => PpbMode::Static {
                atr_divisor: self.atr_divisor,
            },
            PpbModeKind::Dynamic => PpbMode::Dynamic {
                base_divisor: self.base_divisor,
                volatility_window: self.volatility_window,
            },
        }
    }

    /// The ATR estimator is only built when the scale mode reads ATR
    pub fn scale_calculator(&self) -> Result<ScaleCalculator> {
        let estimator = match self.effective_ppb_mode() {
            PpbModeKind::Fixed => None,
            PpbModeKind::Atr | PpbModeKind::Dynamic => Some(self.estimator()?),
        };
        ScaleCalculator::new(self.ppb_mode(), estimator)
    }

    /// Ratios deduplicated and sorted ascending
    pub fn normalized_ratios(&self) -> Result<Vec<f64>> {
        normalize_ratios(&self.ratios)
    }

    /// Check every option the configured pivot source and scale mode will use.
    /// ATR parameters are only checked when detection or scaling reads ATR.
    pub fn validate(&self) -> Result<()> {
        self.scale_calculator()?;
        self.normalized_ratios()?;
        if self.bars_forward == 0 {
            return Err(GannError::config("bars_forward must be > 0, got 0"));
        }
        match self.pivot_source {
            PivotSource::Custom => {
                let pivot = self.custom_pivot.ok_or_else(|| {
                    GannError::config("pivot_source 'custom' requires custom_pivot (index, price)")
                })?;
                if !pivot.price.is_finite() {
                    return Err(GannError::config(format!(
                        "custom_pivot price must be finite, got {}",
                        pivot.price
                    )));
                }
            }
            PivotSource::LastLow | PivotSource::LastHigh => {
                self.pivot_detector()?;
            }
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    #[cfg(feature = "cli")]
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GannError::config(format!("Failed to parse config: {}", e)))
    }

    #[cfg(feature = "cli")]
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Deduplicate and sort ratios; each must be finite and > 0
pub fn normalize_ratios(ratios: &[f64]) -> Result<Vec<f64>> {
    if ratios.is_empty() {
        return Err(GannError::config("ratios must contain at least one value"));
    }
    if let Some(bad) = ratios.iter().find(|r| !(**r > 0.0 && r.is_finite())) {
        return Err(GannError::config(format!(
            "ratios must all be finite and > 0, got {}",
            bad
        )));
    }

    let mut sorted = ratios.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(FanConfig::default().validate().is_ok());
        assert!(FanConfig::adaptive().validate().is_ok());
    }

    #[test]
    fn test_normalize_ratios() {
        let ratios = normalize_ratios(&[2.0, 1.0, 2.0, 0.5, 1.0]).unwrap();
        assert_eq!(ratios, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_normalize_ratios_rejects_degenerate() {
        assert!(normalize_ratios(&[]).is_err());
        assert!(normalize_ratios(&[1.0, 0.0]).is_err());
        assert!(normalize_ratios(&[1.0, f64::NAN]).is_err());
        assert!(normalize_ratios(&[-2.0]).is_err());
    }

    #[test]
    fn test_use_dynamic_ppb_override() {
        let mut config = FanConfig::default();
        assert_eq!(config.effective_ppb_mode(), PpbModeKind::Atr);

        config.use_dynamic_ppb = Some(true);
        assert_eq!(config.effective_ppb_mode(), PpbModeKind::Dynamic);

        let mut adaptive = FanConfig::adaptive();
        adaptive.use_dynamic_ppb = Some(false);
        assert_eq!(adaptive.effective_ppb_mode(), PpbModeKind::Atr);
    }

    #[test]
    fn test_custom_source_requires_pivot() {
        let config = FanConfig {
            pivot_source: PivotSource::Custom,
            ..FanConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("custom_pivot"));
    }

    #[test]
    fn test_custom_source_skips_detector_validation() {
        let config = FanConfig {
            threshold: 0.0,
            pivot_mode: PivotModeKind::Percent,
            ..FanConfig::default()
        }
        .with_custom_pivot(CustomPivot::new(1, 100.0));

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_atr_len_ignored_without_atr_consumers() {
        let percent_fixed = FanConfig {
            atr_len: 1,
            pivot_mode: PivotModeKind::Percent,
            ppb_mode: PpbModeKind::Fixed,
            ..FanConfig::default()
        };
        assert!(percent_fixed.validate().is_ok());

        let custom_fixed = FanConfig {
            atr_len: 0,
            ppb_mode: PpbModeKind::Fixed,
            ..FanConfig::default()
        }
        .with_custom_pivot(CustomPivot::new(1, 100.0));
        assert!(custom_fixed.validate().is_ok());
    }

    #[test]
    fn test_atr_len_checked_when_used() {
        let atr_pivots = FanConfig {
            atr_len: 1,
            ppb_mode: PpbModeKind::Fixed,
            ..FanConfig::default()
        };
        assert!(atr_pivots.validate().unwrap_err().to_string().contains("atr_len"));

        let atr_scale = FanConfig {
            atr_len: 1,
            pivot_mode: PivotModeKind::Percent,
            ..FanConfig::default()
        };
        assert!(atr_scale.validate().unwrap_err().to_string().contains("atr_len"));
    }

    #[test]
    fn test_zero_bars_forward() {
        let config = FanConfig {
            bars_forward: 0,
            ..FanConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("bars_forward"));
    }

    #[test]
    fn test_from_json_partial() {
        let config = FanConfig::from_json_str(
            r#"{"pivot_mode": "percent", "threshold": 0.1, "ratios": [1, 2],
                "custom_pivot": {"index": 3, "price": 10.5, "kind": "high"}}"#,
        )
        .unwrap();

        assert_eq!(config.pivot_mode, PivotModeKind::Percent);
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.ratios, vec![1.0, 2.0]);
        assert_eq!(config.atr_len, 14);
        assert_eq!(config.custom_pivot.unwrap().kind, Some(PivotKind::High));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_from_toml() {
        let config = FanConfig::from_toml_str(
            r#"
            pivot_source = "last_high"
            atr_method = "wilder"
            use_dynamic_ppb = true
            bars_forward = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.pivot_source, PivotSource::LastHigh);
        assert_eq!(config.atr_method, SmoothingMethod::Wilder);
        assert_eq!(config.effective_ppb_mode(), PpbModeKind::Dynamic);
        assert_eq!(config.bars_forward, 40);
    }
}
