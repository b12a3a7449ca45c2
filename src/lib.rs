//! # gann_fan
//!
//! Deterministic Gann fan construction over HLC price series.
//!
//! A fan is a set of straight lines radiating from a pivot bar. Each line
//! moves `ratio * ppb` price units per bar, where the price-per-bar scale is
//! derived from volatility (ATR) at the pivot. Pivots are found by a single
//! forward zigzag-style scan whose reversal threshold is either a fixed
//! percentage or a multiple of ATR.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gann_fan::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let series = CsvSeriesReader::new().load_csv(std::path::Path::new("btc.csv"))?;
//!     let fan = gann_fan(&series, &FanConfig::adaptive())?;
//!
//!     for line in &fan.lines {
//!         println!("{} x1: {} -> {}", line.ratio, line.y_start, line.y_end);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod fan;
pub mod pivot;
pub mod report;
pub mod scale;
pub mod series;
pub mod smoothing;
pub mod types;
pub mod volatility;

pub mod prelude {
    //! Commonly used types
    pub use crate::config::{CustomPivot, FanConfig, PivotModeKind, PivotSource};
    pub use crate::data::{CsvFormat, CsvSeriesReader};
    pub use crate::error::{GannError, Result};
    pub use crate::fan::{gann_fan, FanBuilder, FanDirection, FanLine, FanResult};
    pub use crate::pivot::{Pivot, PivotDetector, PivotKind, PivotMode, PivotSet, PriceScale};
    pub use crate::report::FanReport;
    pub use crate::scale::{PpbMode, PpbModeKind, ScaleCalculator};
    pub use crate::series::{PriceSeries, PriceSource};
    pub use crate::smoothing::SmoothingMethod;
    pub use crate::types::*;
    pub use crate::volatility::{VolatilityEstimator, VolatilityModel};
}
