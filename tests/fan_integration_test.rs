//! End-to-end fan construction tests

use approx::assert_relative_eq;
use gann_fan::prelude::*;

fn btc_sample() -> PriceSeries {
    PriceSeries::from_hlc(
        &[88700.0, 89500.0, 89000.0, 90000.0, 90300.0],
        &[88400.0, 89000.0, 88600.0, 89600.0, 89900.0],
        &[88500.0, 89200.0, 88800.0, 89800.0, 90100.0],
    )
    .unwrap()
}

fn classic_atr_config() -> FanConfig {
    FanConfig {
        atr_len: 3,
        atr_mult: 1.5,
        atr_method: SmoothingMethod::Sma,
        volatility_model: VolatilityModel::Classic,
        ppb_mode: PpbModeKind::Atr,
        atr_divisor: 2.0,
        ratios: vec![1.0, 2.0],
        ..FanConfig::default()
    }
}

fn swing() -> PriceSeries {
    let closes = [100.0, 90.0, 80.0, 90.0, 100.0, 90.0, 80.0];
    PriceSeries::from_hlc(&closes, &closes, &closes).unwrap()
}

#[test]
fn test_classic_atr_fan_from_last_low() {
    let fan = gann_fan(&btc_sample(), &classic_atr_config()).unwrap();

    assert_eq!(fan.pivot_index, 2);
    assert_eq!(fan.pivot_price, 88800.0);
    assert_relative_eq!(fan.ppb, 633.333333 / 2.0, epsilon = 1e-4);
    assert_eq!(fan.lines.len(), 2);

    let one = fan.line(1.0).unwrap();
    let two = fan.line(2.0).unwrap();
    assert_eq!(one.direction, FanDirection::Up);
    assert_eq!(one.end_index, 4);
    assert_relative_eq!(one.y_end, 89433.333, epsilon = 0.01);
    assert_relative_eq!(two.y_end, 90066.667, epsilon = 0.01);
}

#[test]
fn test_short_series_for_default_atr_length() {
    let config = FanConfig {
        ratios: vec![1.0],
        ..FanConfig::default()
    };
    let err = gann_fan(&btc_sample(), &config).unwrap_err();

    match err {
        GannError::InsufficientData {
            required,
            available,
            ..
        } => {
            assert_eq!(required, 15);
            assert_eq!(available, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_percent_fan_from_last_high() {
    let config = FanConfig {
        pivot_source: PivotSource::LastHigh,
        pivot_mode: PivotModeKind::Percent,
        threshold: 0.15,
        ppb_mode: PpbModeKind::Fixed,
        fixed_ppb: 5.0,
        ratios: vec![1.0],
        ..FanConfig::default()
    };
    let fan = gann_fan(&swing(), &config).unwrap();

    assert_eq!(fan.pivot_index, 4);
    assert_eq!(fan.direction(), Some(FanDirection::Down));
    assert_eq!(fan.end_index(), 6);
    assert_relative_eq!(fan.lines[0].y_end, 90.0);
}

#[test]
fn test_flat_tail_keeps_last_real_low() {
    let closes = [100.0, 90.0, 80.0, 90.0, 100.0, 110.0, 110.0, 110.0, 110.0, 110.0];
    let series = PriceSeries::from_hlc(&closes, &closes, &closes).unwrap();
    let config = FanConfig {
        atr_len: 3,
        atr_mult: 1.0,
        ratios: vec![1.0],
        ..FanConfig::default()
    };
    let fan = gann_fan(&series, &config).unwrap();

    assert_eq!(fan.pivot_index, 4);
    assert_eq!(fan.pivot_price, 100.0);
    assert_relative_eq!(fan.ppb, 10.0, epsilon = 1e-9);
    assert_eq!(fan.end_index(), 9);
}

#[test]
fn test_horizon_is_clamped_by_bars_forward() {
    let config = FanConfig {
        bars_forward: 1,
        ..classic_atr_config()
    };
    let fan = gann_fan(&btc_sample(), &config).unwrap();

    assert_eq!(fan.end_index(), 3);
    assert_relative_eq!(fan.lines[0].y_end, 88800.0 + fan.ppb, epsilon = 1e-9);
}

#[test]
fn test_ratios_deduplicated_and_sorted() {
    let config = FanConfig {
        ratios: vec![2.0, 0.5, 2.0, 1.0],
        ..classic_atr_config()
    };
    let fan = gann_fan(&btc_sample(), &config).unwrap();

    let ratios: Vec<f64> = fan.lines.iter().map(|l| l.ratio).collect();
    assert_eq!(ratios, vec![0.5, 1.0, 2.0]);
    for pair in fan.lines.windows(2) {
        assert!(pair[0].y_end < pair[1].y_end);
    }
}

#[test]
fn test_custom_pivot_with_static_ppb() {
    let config = classic_atr_config().with_custom_pivot(CustomPivot::new(3, 89800.0));
    let fan = gann_fan(&btc_sample(), &config).unwrap();

    // Only one close follows bar 3 and it is higher: fan points up
    assert_eq!(fan.direction(), Some(FanDirection::Up));
    assert_relative_eq!(fan.ppb, 933.333333 / 2.0, epsilon = 1e-4);
}

#[test]
fn test_custom_pivot_in_atr_warmup() {
    let config = classic_atr_config().with_custom_pivot(CustomPivot::new(1, 89200.0));
    let err = gann_fan(&btc_sample(), &config).unwrap_err();

    assert!(matches!(err, GannError::UndefinedValue { index: 1, .. }));
}

#[test]
fn test_no_low_found_reports_mode() {
    let config = FanConfig {
        pivot_mode: PivotModeKind::Percent,
        threshold: 0.5,
        ppb_mode: PpbModeKind::Fixed,
        ..FanConfig::default()
    };
    let err = gann_fan(&swing(), &config).unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("No pivot low found"));
    assert!(msg.contains("percent threshold 0.5"));
}

#[test]
fn test_invalid_config_fails_before_data() {
    let config = FanConfig {
        ratios: vec![],
        ..FanConfig::default()
    };

    assert!(matches!(
        FanBuilder::new(config),
        Err(GannError::ConfigError(_))
    ));
}

#[test]
fn test_deterministic() {
    let builder = FanBuilder::new(classic_atr_config()).unwrap();
    let first = builder.build(&btc_sample()).unwrap();
    let second = builder.build(&btc_sample()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_adaptive_preset_on_trending_series() {
    // Geometric uptrend with a pullback every 10 bars
    let mut closes = Vec::new();
    let mut price = 100.0;
    for i in 0..120 {
        price *= if i % 10 < 7 { 1.03 } else { 0.96 };
        closes.push(price);
    }
    let highs: Vec<f64> = closes.iter().map(|c| c * 1.01).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c * 0.99).collect();
    let series = PriceSeries::from_hlc(&highs, &lows, &closes).unwrap();

    let config = FanConfig {
        volatility_window: 20,
        ..FanConfig::adaptive()
    };
    let fan = gann_fan(&series, &config).unwrap();

    assert_eq!(fan.lines.len(), 7);
    assert_eq!(fan.direction(), Some(FanDirection::Up));
    assert!(fan.ppb > 0.0 && fan.ppb.is_finite());
    assert!(fan.pivot_index >= 20);
}

#[test]
fn test_build_batch_matches_sequential() {
    let builder = FanBuilder::new(classic_atr_config()).unwrap();
    let batch = vec![btc_sample(), swing(), btc_sample()];

    let results = builder.build_batch(&batch);
    assert_eq!(results.len(), 3);
    for (series, result) in batch.iter().zip(&results) {
        match (builder.build(series), result) {
            (Ok(a), Ok(b)) => assert_eq!(&a, b),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            _ => panic!("batch and sequential results disagree"),
        }
    }
}

#[test]
fn test_report_from_fan() {
    let series = btc_sample();
    let fan = gann_fan(&series, &classic_atr_config()).unwrap();
    let report = FanReport::new(&series, &fan);

    assert_eq!(report.pivot_index, 2);
    assert_eq!(report.end_index, 4);
    assert_eq!(report.lines.len(), 2);
    assert_relative_eq!(report.lines[1].slope, 2.0 * fan.ppb);
    assert!(report.to_string().contains("Gann Fan Summary"));
}
