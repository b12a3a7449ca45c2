//! Moving averages used to smooth true range

use crate::error::{GannError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Smoothing applied to the true range series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMethod {
    /// Simple moving average over the window
    #[default]
    Sma,
    /// Wilder's recursive smoothing, factor 1/n
    Wilder,
    /// Exponential moving average, factor 2/(n+1)
    Ema,
}

impl fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmoothingMethod::Sma => "sma",
            SmoothingMethod::Wilder => "wilder",
            SmoothingMethod::Ema => "ema",
        };
        f.write_str(name)
    }
}

impl FromStr for SmoothingMethod {
    type Err = GannError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sma" => Ok(SmoothingMethod::Sma),
            "wilder" => Ok(SmoothingMethod::Wilder),
            "ema" => Ok(SmoothingMethod::Ema),
            other => Err(GannError::config(format!(
                "atr_method must be 'sma', 'wilder' or 'ema', got '{}'",
                other
            ))),
        }
    }
}

/// Simple Moving Average (SMA)
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    window: usize,
    values: VecDeque<f64>,
}

impl SimpleMovingAverage {
    /// Create new SMA with given window size. Callers validate `window > 0`.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
        }
    }

    /// Add a value and compute current SMA
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);

        if self.values.len() > self.window {
            self.values.pop_front();
        }

        self.current()
    }

    /// Get current value (if window is full)
    pub fn current(&self) -> Option<f64> {
        if self.window > 0 && self.values.len() == self.window {
            Some(self.values.iter().sum::<f64>() / self.window as f64)
        } else {
            None
        }
    }
}

/// Recursive average seeded by the first full SMA window.
///
/// Wilder and EMA smoothing differ only in `alpha`; both stay undefined until
/// `period` values have been seen, then `avg += alpha * (value - avg)`.
#[derive(Debug, Clone)]
pub struct RecursiveAverage {
    alpha: f64,
    seed: SimpleMovingAverage,
    current: Option<f64>,
}

impl RecursiveAverage {
    /// Wilder smoothing, alpha = 1/period
    pub fn wilder(period: usize) -> Self {
        Self::with_alpha(period, 1.0 / period as f64)
    }

    /// Exponential smoothing with span `period`, alpha = 2/(period+1)
    pub fn ema(period: usize) -> Self {
        Self::with_alpha(period, 2.0 / (period as f64 + 1.0))
    }

    fn with_alpha(period: usize, alpha: f64) -> Self {
        Self {
            alpha,
            seed: SimpleMovingAverage::new(period),
            current: None,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        let next = match self.current {
            Some(prev) => Some(prev + self.alpha * (value - prev)),
            None => self.seed.update(value),
        };
        self.current = next;
        next
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }
}

/// Smooth `values` with `method`, NaN where the average is not yet defined
pub fn smooth(method: SmoothingMethod, period: usize, values: &[f64]) -> Vec<f64> {
    match method {
        SmoothingMethod::Sma => {
            let mut sma = SimpleMovingAverage::new(period);
            values
                .iter()
                .map(|&v| sma.update(v).unwrap_or(f64::NAN))
                .collect()
        }
        SmoothingMethod::Wilder | SmoothingMethod::Ema => {
            let mut avg = if method == SmoothingMethod::Wilder {
                RecursiveAverage::wilder(period)
            } else {
                RecursiveAverage::ema(period)
            };
            values
                .iter()
                .map(|&v| avg.update(v).unwrap_or(f64::NAN))
                .collect()
        }
    }
}
