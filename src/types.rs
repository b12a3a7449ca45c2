//! Core types and constants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Price type (using f64 for precision)
pub type Price = f64;

/// Quantity/volume type
pub type Quantity = f64;

/// HLC bar with optional timestamp and volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    #[serde(default)]
    pub volume: Option<Quantity>,
}

impl Bar {
    /// Create a new bar without timestamp or volume
    pub fn new(high: Price, low: Price, close: Price) -> Self {
        Self {
            timestamp: None,
            high,
            low,
            close,
            volume: None,
        }
    }

    /// Attach a timestamp
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attach a traded volume
    pub fn with_volume(mut self, volume: Quantity) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Get typical price (HLC/3)
    pub fn typical_price(&self) -> Price {
        (self.high + self.low + self.close) / 3.0
    }

    /// Get price range (high - low)
    pub fn range(&self) -> Price {
        self.high - self.low
    }

    /// True range against the previous close.
    ///
    /// Without a previous close the true range is the bar's own range.
    pub fn true_range(&self, prev_close: Option<Price>) -> Price {
        match prev_close {
            Some(pc) => self
                .range()
                .max((self.high - pc).abs())
                .max((self.low - pc).abs()),
            None => self.range(),
        }
    }
}
