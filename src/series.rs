//! Price series container
//!
//! A [`PriceSeries`] is the chronologically ordered table every computation in
//! this crate reads from. Bar index `0..n-1` is the time axis used by all
//! formulas.

use crate::error::{GannError, Result};
use crate::types::{Bar, Price};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which price of a bar feeds pivot detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    #[default]
    Close,
    High,
    Low,
    /// (high + low + close) / 3
    Typical,
}

impl PriceSource {
    /// Extract this price from a bar
    pub fn of(self, bar: &Bar) -> Price {
        match self {
            PriceSource::Close => bar.close,
            PriceSource::High => bar.high,
            PriceSource::Low => bar.low,
            PriceSource::Typical => bar.typical_price(),
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceSource::Close => "close",
            PriceSource::High => "high",
            PriceSource::Low => "low",
            PriceSource::Typical => "typical",
        };
        f.write_str(name)
    }
}

impl FromStr for PriceSource {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "close" => Ok(PriceSource::Close),
            "high" => Ok(PriceSource::High),
            "low" => Ok(PriceSource::Low),
            "typical" => Ok(PriceSource::Typical),
            other => Err(GannError::config(format!(
                "price_source must be 'close', 'high', 'low' or 'typical', got '{}'",
                other
            ))),
        }
    }
}

/// Ordered, index-addressable sequence of bars
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Wrap bars that are already in chronological order
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    /// Build a series from parallel high/low/close columns
    pub fn from_hlc(high: &[Price], low: &[Price], close: &[Price]) -> Result<Self> {
        if high.len() != low.len() || high.len() != close.len() {
            return Err(GannError::DataError(format!(
                "Column length mismatch: high={}, low={}, close={}",
                high.len(),
                low.len(),
                close.len()
            )));
        }

        let bars = high
            .iter()
            .zip(low)
            .zip(close)
            .map(|((&h, &l), &c)| Bar::new(h, l, c))
            .collect();

        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn highs(&self) -> Vec<Price> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<Price> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<Price> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Prices selected by `source`, one per bar
    pub fn prices(&self, source: PriceSource) -> Vec<Price> {
        self.bars.iter().map(|b| source.of(b)).collect()
    }

    /// Fail with [`GannError::InsufficientData`] unless at least `required` bars exist
    pub fn require_len(&self, required: usize, context: &str) -> Result<()> {
        if self.bars.len() < required {
            return Err(GannError::InsufficientData {
                context: context.to_string(),
                required,
                available: self.bars.len(),
            });
        }
        Ok(())
    }

    /// Check that every bar holds finite, positive prices with high >= low
    pub fn validate(&self) -> Result<()> {
        for (i, bar) in self.bars.iter().enumerate() {
            let fields = [("high", bar.high), ("low", bar.low), ("close", bar.close)];
            for (name, value) in fields {
                if !value.is_finite() {
                    return Err(GannError::DataError(format!(
                        "Bar {} has non-finite {}: {}",
                        i, name, value
                    )));
                }
                if value <= 0.0 {
                    return Err(GannError::DataError(format!(
                        "Bar {} has non-positive {}: {}",
                        i, name, value
                    )));
                }
            }
            if bar.high < bar.low {
                return Err(GannError::DataError(format!(
                    "Bar {} has high < low: H={} L={}",
                    i, bar.high, bar.low
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<Bar>> for PriceSeries {
    fn from(bars: Vec<Bar>) -> Self {
        Self::new(bars)
    }
}
