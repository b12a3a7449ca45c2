//! Fan construction
//!
//! [`FanBuilder::build`] is a linear pipeline with an early exit on every
//! stage: resolve pivot, resolve scale, determine horizon, build lines. A
//! failure at any stage returns that stage's error untouched; no partial
//! result is ever produced.

use crate::config::{FanConfig, PivotSource};
use crate::error::{GannError, Result};
use crate::pivot::{Pivot, PivotDetector, PivotKind};
use crate::scale::ScaleCalculator;
use crate::series::PriceSeries;
use crate::types::Price;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closes after a custom pivot that vote on its direction
const DIRECTION_LOOKAHEAD: usize = 10;

/// Direction a fan line travels from the pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanDirection {
    Up,
    Down,
}

impl FanDirection {
    /// +1 for up, -1 for down
    pub fn sign(self) -> f64 {
        match self {
            FanDirection::Up => 1.0,
            FanDirection::Down => -1.0,
        }
    }
}

impl From<PivotKind> for FanDirection {
    fn from(kind: PivotKind) -> Self {
        match kind {
            PivotKind::Low => FanDirection::Up,
            PivotKind::High => FanDirection::Down,
        }
    }
}

impl fmt::Display for FanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanDirection::Up => f.pad("up"),
            FanDirection::Down => f.pad("down"),
        }
    }
}

/// One projected ray
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanLine {
    pub ratio: f64,
    pub direction: FanDirection,
    pub start_index: usize,
    pub end_index: usize,
    pub y_start: Price,
    pub y_end: Price,
}

impl FanLine {
    /// Line equation `y_start ± ratio * ppb * (index - start_index)`.
    ///
    /// Indices before the pivot extrapolate backwards.
    pub fn price_at(&self, ppb: f64, index: usize) -> Price {
        let bars = index as f64 - self.start_index as f64;
        self.y_start + self.direction.sign() * self.ratio * ppb * bars
    }

    /// Price change per bar
    pub fn slope(&self, ppb: f64) -> f64 {
        self.direction.sign() * self.ratio * ppb
    }
}

/// Pivot, scale and lines of one fan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanResult {
    pub pivot_index: usize,
    pub pivot_price: Price,
    pub ppb: f64,
    pub lines: Vec<FanLine>,
}

impl FanResult {
    pub fn direction(&self) -> Option<FanDirection> {
        self.lines.first().map(|l| l.direction)
    }

    pub fn end_index(&self) -> usize {
        self.lines
            .first()
            .map(|l| l.end_index)
            .unwrap_or(self.pivot_index)
    }

    /// Line with exactly this ratio, if present
    pub fn line(&self, ratio: f64) -> Option<&FanLine> {
        self.lines.iter().find(|l| l.ratio == ratio)
    }

    /// Evaluate `line` at `index` using this fan's scale
    pub fn price_at(&self, line: &FanLine, index: usize) -> Price {
        line.price_at(self.ppb, index)
    }
}

/// Validated fan pipeline; reusable across series
#[derive(Debug, Clone)]
pub struct FanBuilder {
    config: FanConfig,
    detector: Option<PivotDetector>,
    scale: ScaleCalculator,
    ratios: Vec<f64>,
}

impl FanBuilder {
    /// Validate `config` and prepare the pipeline stages
    pub fn new(config: FanConfig) -> Result<Self> {
        config.validate()?;

        let detector = match config.pivot_source {
            PivotSource::Custom => None,
            PivotSource::LastLow | PivotSource::LastHigh => Some(config.pivot_detector()?),
        };
        let scale = config.scale_calculator()?;
        let ratios = config.normalized_ratios()?;

        Ok(Self {
            config,
            detector,
            scale,
            ratios,
        })
    }

    pub fn config(&self) -> &FanConfig {
        &self.config
    }

    /// Ratios the builder will draw, ascending and unique
    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    /// Build one fan over `series`
    pub fn build(&self, series: &PriceSeries) -> Result<FanResult> {
        series.require_len(2, "fan construction")?;

        let pivot = self.resolve_pivot(series)?;
        log::debug!(
            "Pivot {} at bar {} (price {})",
            pivot.kind,
            pivot.index,
            pivot.price
        );

        let ppb = self.scale.compute(series, &pivot)?;
        log::debug!("Price per bar: {}", ppb);

        let end_index = self.horizon(series, &pivot);
        log::debug!(
            "Projecting {} lines from bar {} to bar {}",
            self.ratios.len(),
            pivot.index,
            end_index
        );

        Ok(FanResult {
            pivot_index: pivot.index,
            pivot_price: pivot.price,
            ppb,
            lines: self.build_lines(&pivot, ppb, end_index),
        })
    }

    /// Build independent fans over many series in parallel, order preserved
    pub fn build_batch(&self, series: &[PriceSeries]) -> Vec<Result<FanResult>> {
        series.par_iter().map(|s| self.build(s)).collect()
    }

    /// Select the anchoring pivot: custom, or the last detected low/high
    pub fn resolve_pivot(&self, series: &PriceSeries) -> Result<Pivot> {
        let kind = match self.config.pivot_source {
            PivotSource::Custom => return self.custom_pivot(series),
            PivotSource::LastLow => PivotKind::Low,
            PivotSource::LastHigh => PivotKind::High,
        };
        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| GannError::config("pivot detector not configured"))?;

        let pivots = detector.detect(series)?;
        log::debug!(
            "Detected {} lows and {} highs using {}",
            pivots.lows.len(),
            pivots.highs.len(),
            detector.describe()
        );

        pivots.last(kind).ok_or_else(|| GannError::NoPivotFound {
            kind,
            mode: detector.describe(),
        })
    }

    fn custom_pivot(&self, series: &PriceSeries) -> Result<Pivot> {
        let custom = self.config.custom_pivot.ok_or_else(|| {
            GannError::config("pivot_source 'custom' requires custom_pivot (index, price)")
        })?;

        if custom.index >= series.len() {
            return Err(GannError::config(format!(
                "custom_pivot index {} out of range [0, {}]",
                custom.index,
                series.len() - 1
            )));
        }

        let kind = custom
            .kind
            .unwrap_or_else(|| infer_kind(series, custom.index, custom.price));
        Ok(Pivot::new(custom.index, custom.price, kind))
    }

    fn horizon(&self, series: &PriceSeries, pivot: &Pivot) -> usize {
        pivot
            .index
            .saturating_add(self.config.bars_forward)
            .min(series.len() - 1)
    }

    fn build_lines(&self, pivot: &Pivot, ppb: f64, end_index: usize) -> Vec<FanLine> {
        let direction = FanDirection::from(pivot.kind);
        let bars = (end_index - pivot.index) as f64;

        self.ratios
            .iter()
            .map(|&ratio| FanLine {
                ratio,
                direction,
                start_index: pivot.index,
                end_index,
                y_start: pivot.price,
                y_end: pivot.price + direction.sign() * ratio * ppb * bars,
            })
            .collect()
    }
}

/// A custom pivot followed by higher closes on average is treated as a low
fn infer_kind(series: &PriceSeries, index: usize, price: Price) -> PivotKind {
    let after = &series.bars()[index + 1..];
    let window = &after[..after.len().min(DIRECTION_LOOKAHEAD)];
    if window.is_empty() {
        return PivotKind::Low;
    }

    let mean = window.iter().map(|b| b.close).sum::<f64>() / window.len() as f64;
    if mean > price {
        PivotKind::Low
    } else {
        PivotKind::High
    }
}

/// Build a single fan over `series` with `config`
pub fn gann_fan(series: &PriceSeries, config: &FanConfig) -> Result<FanResult> {
    FanBuilder::new(config.clone())?.build(series)
}
