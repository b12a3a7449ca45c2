//! gann-fan CLI - build a Gann fan from a CSV price file
//!
//! ## Example Usage
//!
//! ```bash
//! # Classic fan from the last ATR-confirmed low
//! gann-fan --csv btc.csv
//!
//! # Adaptive preset, fan from the last high, JSON output
//! gann-fan --csv btc.csv --preset adaptive --pivot-source last_high --json
//!
//! # Custom pivot with fixed scale
//! gann-fan --csv btc.csv --pivot-idx 120 --pivot-price 42000 --ppb-mode fixed --fixed-ppb 150
//! ```

use clap::{Parser, ValueEnum};
use colored::Colorize;
use gann_fan::config::{normalize_ratios, CustomPivot, FanConfig, PivotModeKind, PivotSource};
use gann_fan::data::{CsvFormat, CsvSeriesReader};
use gann_fan::error::{GannError, Result};
use gann_fan::fan::FanBuilder;
use gann_fan::pivot::{PivotKind, PriceScale};
use gann_fan::report::FanReport;
use gann_fan::scale::PpbModeKind;
use gann_fan::series::PriceSource;
use gann_fan::smoothing::SmoothingMethod;
use gann_fan::volatility::VolatilityModel;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    Classic,
    Adaptive,
}

/// gann-fan: volatility-scaled Gann fan projection
#[derive(Parser, Debug)]
#[command(name = "gann-fan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Build a Gann fan from an HLC price file", long_about = None)]
struct Cli {
    /// CSV file with High, Low, Close (and optional Date, Volume) columns
    #[arg(long, value_name = "FILE")]
    csv: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Base option set before file values and flags are applied
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Date format for date-only values in the CSV
    #[arg(long)]
    date_format: Option<String>,

    /// last_low, last_high or custom
    #[arg(long)]
    pivot_source: Option<PivotSource>,

    /// atr or percent
    #[arg(long)]
    pivot_mode: Option<PivotModeKind>,

    /// Relative reversal threshold in percent mode (0.05 = 5%)
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    atr_len: Option<usize>,

    #[arg(long)]
    atr_mult: Option<f64>,

    /// sma, wilder or ema
    #[arg(long)]
    atr_method: Option<SmoothingMethod>,

    /// classic or adaptive
    #[arg(long)]
    volatility_model: Option<VolatilityModel>,

    /// linear or log
    #[arg(long)]
    price_scale: Option<PriceScale>,

    /// close, high, low or typical
    #[arg(long)]
    price_source: Option<PriceSource>,

    /// fixed, atr or dynamic
    #[arg(long)]
    ppb_mode: Option<PpbModeKind>,

    /// Force dynamic scaling on or off
    #[arg(long)]
    use_dynamic_ppb: Option<bool>,

    #[arg(long)]
    atr_divisor: Option<f64>,

    #[arg(long)]
    fixed_ppb: Option<f64>,

    #[arg(long)]
    base_divisor: Option<f64>,

    #[arg(long)]
    volatility_window: Option<usize>,

    /// Comma-separated slope ratios, e.g. "0.125,0.25,0.5,1,2,4,8"
    #[arg(long)]
    ratios: Option<String>,

    #[arg(long)]
    bars_forward: Option<usize>,

    /// Custom pivot bar index (requires --pivot-price)
    #[arg(long, requires = "pivot_price")]
    pivot_idx: Option<usize>,

    /// Custom pivot price (requires --pivot-idx)
    #[arg(long, requires = "pivot_idx")]
    pivot_price: Option<f64>,

    /// Custom pivot kind; inferred from the following closes when omitted
    #[arg(long, requires = "pivot_idx")]
    pivot_kind: Option<PivotKind>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.verbose {
        println!(
            "{} v{}",
            "gann-fan".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
    }

    if let Err(e) = run(&cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;
    if cli.verbose {
        println!("{} {}", "Config:".bold(), serde_json::to_string(&config)?);
    }

    let mut format = CsvFormat::default();
    if let Some(date_format) = &cli.date_format {
        format.date_format = date_format.clone();
    }
    let series = CsvSeriesReader::with_format(format).load_csv(&cli.csv)?;

    let result = FanBuilder::new(config)?.build(&series)?;
    let report = FanReport::new(&series, &result);

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
        println!(
            "{} {} lines from bar {}",
            "Projected".green().bold(),
            result.lines.len(),
            result.pivot_index
        );
    }
    Ok(())
}

fn load_base(cli: &Cli) -> Result<FanConfig> {
    if let Some(path) = &cli.config {
        return FanConfig::load(path);
    }
    if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            match FanConfig::load(&default_path) {
                Ok(config) => return Ok(config),
                Err(e) => eprintln!(
                    "{} Ignoring {}: {}",
                    "Warning:".yellow(),
                    default_path.display(),
                    e
                ),
            }
        }
    }
    Ok(match cli.preset {
        Some(Preset::Adaptive) => FanConfig::adaptive(),
        Some(Preset::Classic) | None => FanConfig::default(),
    })
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gann-fan").join("config.toml"))
}

/// Config file (or preset) with command-line flags applied on top
fn build_config(cli: &Cli) -> Result<FanConfig> {
    let mut config = load_base(cli)?;

    macro_rules! apply {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = cli.$field.clone() {
                config.$field = value;
            })*
        };
    }
    apply!(
        pivot_source,
        pivot_mode,
        threshold,
        atr_len,
        atr_mult,
        atr_method,
        volatility_model,
        price_scale,
        price_source,
        ppb_mode,
        atr_divisor,
        fixed_ppb,
        base_divisor,
        volatility_window,
        bars_forward,
    );

    if cli.use_dynamic_ppb.is_some() {
        config.use_dynamic_ppb = cli.use_dynamic_ppb;
    }
    if let Some(ratios) = &cli.ratios {
        config.ratios = parse_ratios(ratios)?;
    }
    if let (Some(index), Some(price)) = (cli.pivot_idx, cli.pivot_price) {
        let mut pivot = CustomPivot::new(index, price);
        pivot.kind = cli.pivot_kind;
        config = config.with_custom_pivot(pivot);
    }

    Ok(config)
}

fn parse_ratios(raw: &str) -> Result<Vec<f64>> {
    let ratios = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| GannError::ConfigError(format!("invalid ratio '{}'", s)))
        })
        .collect::<Result<Vec<_>>>()?;
    normalize_ratios(&ratios)
}
