//! Human and JSON summaries of a built fan

use crate::error::Result;
use crate::fan::{FanDirection, FanResult};
use crate::series::PriceSeries;
use crate::types::{Price, Timestamp};
use serde::Serialize;
use std::fmt;

/// One row of the line table
#[derive(Debug, Clone, Serialize)]
pub struct LineSummary {
    pub ratio: f64,
    pub direction: FanDirection,
    pub y_start: Price,
    pub y_end: Price,
    /// Signed price change per bar
    pub slope: f64,
}

/// Fan summary joined with the series' timestamps
#[derive(Debug, Clone, Serialize)]
pub struct FanReport {
    pub bars: usize,
    pub pivot_index: usize,
    pub pivot_price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot_time: Option<Timestamp>,
    pub ppb: f64,
    pub end_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    pub lines: Vec<LineSummary>,
}

impl FanReport {
    pub fn new(series: &PriceSeries, result: &FanResult) -> Self {
        let end_index = result.end_index();
        let time_at = |i: usize| series.get(i).and_then(|b| b.timestamp);

        Self {
            bars: series.len(),
            pivot_index: result.pivot_index,
            pivot_price: result.pivot_price,
            pivot_time: time_at(result.pivot_index),
            ppb: result.ppb,
            end_index,
            end_time: time_at(end_index),
            lines: result
                .lines
                .iter()
                .map(|line| LineSummary {
                    ratio: line.ratio,
                    direction: line.direction,
                    y_start: line.y_start,
                    y_end: line.y_end,
                    slope: line.slope(result.ppb),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn fmt_index(f: &mut fmt::Formatter<'_>, index: usize, time: Option<Timestamp>) -> fmt::Result {
    match time {
        Some(t) => write!(f, "{} ({})", index, t.format("%Y-%m-%d %H:%M:%S")),
        None => write!(f, "{}", index),
    }
}

impl fmt::Display for FanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Gann Fan Summary:")?;
        writeln!(f, "  Bars:            {}", self.bars)?;
        write!(f, "  Pivot:           ")?;
        fmt_index(f, self.pivot_index, self.pivot_time)?;
        writeln!(f, " @ {:.4}", self.pivot_price)?;
        writeln!(f, "  Price per bar:   {:.6}", self.ppb)?;
        write!(f, "  Projected to:    ")?;
        fmt_index(f, self.end_index, self.end_time)?;
        writeln!(f)?;
        writeln!(f, "  Lines:           {}", self.lines.len())?;
        writeln!(f)?;
        writeln!(
            f,
            "  {:>8}  {:>5}  {:>14}  {:>14}  {:>12}",
            "ratio", "dir", "start", "end", "slope/bar"
        )?;
        for line in &self.lines {
            writeln!(
                f,
                "  {:>8.3}  {:>5}  {:>14.4}  {:>14.4}  {:>12.6}",
                line.ratio, line.direction, line.y_start, line.y_end, line.slope
            )?;
        }
        Ok(())
    }
}
