use crate::cadence::avg_trades_per_day;
use crate::config::ForecastConfig;
use crate::ledger::filter_trades;
use crate::merge::merge_trajectory;
use crate::models::{TradeRecord, TrajectoryPoint};
use crate::projection::{ForecastAnchor, ForecastGenerator};
use crate::statistics::{full_profile, recent_profile, DistributionProfile, SpreadCoefficients};
use crate::trajectory::TrajectoryBuilder;
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    pub model_pattern: String,
    pub trade_count: usize,
    pub median_net_profit: Option<f64>,
    pub std_dev: Option<f64>,
    pub recent_window_len: usize,
    pub spread_defined: bool,
    pub trades_per_day: Option<f64>,
    pub regression_slope: Option<f64>,
    pub median_slope: Option<f64>,
    pub final_cumulative_pnl: Option<f64>,
    pub forecast_steps: usize,
}

#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub summary: ForecastSummary,
    pub full_profile: DistributionProfile,
    pub spread: SpreadCoefficients,
    pub points: Vec<TrajectoryPoint>,
}

impl ForecastOutcome {
    pub fn actual_points(&self) -> impl Iterator<Item = &TrajectoryPoint> {
        self.points.iter().filter(|point| !point.is_predicted())
    }

    pub fn predicted_points(&self) -> impl Iterator<Item = &TrajectoryPoint> {
        self.points.iter().filter(|point| point.is_predicted())
    }
}

pub struct ForecastPipeline<'a> {
    config: &'a ForecastConfig,
}

impl<'a> ForecastPipeline<'a> {
    pub fn new(config: &'a ForecastConfig) -> Self {
        Self { config }
    }

    /// Filters `ledger` for the configured model and runs every stage on that snapshot.
    pub fn run(&self, ledger: &[TradeRecord]) -> ForecastOutcome {
        let filtered = filter_trades(ledger, &self.config.ledger_query());
        self.run_filtered(&filtered)
    }

    /// `filtered` must already satisfy the ledger query and be in `(close_time, id)` order.
    pub fn run_filtered(&self, filtered: &[TradeRecord]) -> ForecastOutcome {
        let config = self.config;
        if filtered.is_empty() {
            warn!(
                "No trades matched model pattern '{}'; trajectory will be empty",
                config.model_pattern
            );
        }

        let full = full_profile(filtered, &config.percentiles);
        let spread = recent_profile(filtered, config.recent_window, &config.percentiles);
        let trades_per_day = avg_trades_per_day(filtered);

        if !filtered.is_empty() {
            if full.std_dev.filter(|value| *value > 0.0).is_none() {
                warn!(
                    "Net profit deviation undefined or zero for '{}'; forecast bands collapse to the central estimate",
                    config.model_pattern
                );
            }
            if !spread.is_defined() {
                warn!(
                    "Recent window of {} trade(s) for '{}' has no spread; percentile offsets treated as zero",
                    spread.window_len, config.model_pattern
                );
            }
            if trades_per_day.is_none() {
                warn!(
                    "Trades for '{}' span less than one calendar day; forecasting a single step",
                    config.model_pattern
                );
            }
        }

        let actual = TrajectoryBuilder::new(
            config.scale_factor,
            full.median,
            &config.forecast_category,
        )
        .build(filtered);

        let generator = ForecastGenerator {
            full_profile: &full,
            spread: &spread,
            trades_per_day,
            scale_factor: config.scale_factor,
            horizon: config.horizon,
            max_steps: config.max_forecast_steps,
        };
        let forecast = match actual.last() {
            Some(last) => generator.generate(&ForecastAnchor {
                last_time: last.close_time,
                last_cumulative_pnl: last.cumulative_pnl,
                median_slope: actual.median_slope,
                last_median_slope_value: actual.last_median_slope_value(),
            }),
            None => Vec::new(),
        };

        let points = merge_trajectory(&actual, &forecast, filtered, &config.forecast_category);

        let summary = ForecastSummary {
            model_pattern: config.model_pattern.clone(),
            trade_count: filtered.len(),
            median_net_profit: full.median,
            std_dev: full.std_dev,
            recent_window_len: spread.window_len,
            spread_defined: spread.is_defined(),
            trades_per_day,
            regression_slope: actual.regression_slope,
            median_slope: actual.median_slope,
            final_cumulative_pnl: actual.final_cumulative_pnl(),
            forecast_steps: forecast.len(),
        };
        info!(
            "Forecast for '{}': {} trades, {} trades/day, final PnL {}, {} forecast step(s)",
            summary.model_pattern,
            summary.trade_count,
            format_optional(summary.trades_per_day),
            format_optional(summary.final_cumulative_pnl),
            summary.forecast_steps
        );

        ForecastOutcome {
            summary,
            full_profile: full,
            spread,
            points,
        }
    }
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PointLabel, TradeDetails};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn trade(id: &str, close: DateTime<Utc>, net_profit: f64) -> TradeRecord {
        TradeRecord {
            id: id.to_string(),
            symbol: "BTCUSDT".to_string(),
            model_id: "scalper-v1".to_string(),
            category: "auto".to_string(),
            open_time: close - Duration::minutes(30),
            close_time: close,
            net_profit,
            details: TradeDetails::default(),
        }
    }

    fn random_ledger(seed: u64, count: usize) -> Vec<TradeRecord> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut close = base();
        (0..count)
            .map(|idx| {
                close += Duration::minutes(rng.i64(1..600));
                let profit = (rng.f64() - 0.45) * 8.0;
                trade(&format!("r{:05}", idx), close, profit)
            })
            .collect()
    }

    #[test]
    fn single_day_example_from_three_trades() {
        let ledger = vec![
            trade("a", base(), 1.0),
            trade("b", base() + Duration::hours(1), -0.5),
            trade("c", base() + Duration::hours(2), 2.0),
        ];
        let config = ForecastConfig::for_model("scalper");
        let outcome = ForecastPipeline::new(&config).run(&ledger);

        let actual: Vec<f64> = outcome.actual_points().map(|p| p.cumulative_pnl).collect();
        assert_eq!(actual, vec![10.0, 5.0, 25.0]);
        assert_eq!(outcome.summary.median_net_profit, Some(1.0));
        assert_eq!(outcome.summary.trades_per_day, None);

        let predicted: Vec<&TrajectoryPoint> = outcome.predicted_points().collect();
        assert_eq!(predicted.len(), 1);
        assert_eq!(predicted[0].timestamp, base() + Duration::hours(2) + Duration::days(3));
        assert!((predicted[0].cumulative_pnl - 25.0).abs() < 1e-12);
        assert_eq!(predicted[0].category, "predict");
        assert_eq!(predicted[0].bands.len(), 6);
    }

    #[test]
    fn empty_ledger_produces_empty_trajectory() {
        let config = ForecastConfig::for_model("scalper");
        let outcome = ForecastPipeline::new(&config).run(&[]);
        assert!(outcome.points.is_empty());
        assert_eq!(outcome.summary.trade_count, 0);
        assert_eq!(outcome.summary.forecast_steps, 0);
        assert_eq!(outcome.summary.final_cumulative_pnl, None);
    }

    #[test]
    fn random_ledgers_respect_trajectory_invariants() {
        let config = ForecastConfig::for_model("scalper");
        for seed in 1..=12 {
            let ledger = random_ledger(seed, 40 + seed as usize * 25);
            let outcome = ForecastPipeline::new(&config).run(&ledger);

            let actual: Vec<&TrajectoryPoint> = outcome.actual_points().collect();
            assert_eq!(actual.len(), ledger.len());
            let mut expected = 0.0;
            for (point, trade) in actual.iter().zip(&ledger) {
                expected += trade.net_profit * config.scale_factor;
                assert!((point.cumulative_pnl - expected).abs() < 1e-6);
                assert_eq!(point.trade.as_ref().map(|t| t.id.as_str()), Some(trade.id.as_str()));
            }

            let last_actual = actual.last().unwrap().timestamp;
            let predicted: Vec<&TrajectoryPoint> = outcome.predicted_points().collect();
            assert!(!predicted.is_empty());
            assert!(predicted.iter().all(|p| p.timestamp > last_actual));
            assert!(predicted
                .windows(2)
                .all(|pair| pair[0].timestamp < pair[1].timestamp));
            assert_eq!(
                predicted.last().unwrap().timestamp,
                last_actual + config.horizon
            );

            for point in &predicted {
                assert_eq!(point.label, PointLabel::Predicted);
                let values: Vec<f64> = point.bands.iter().map(|b| b.value).collect();
                assert!(values.windows(2).all(|pair| pair[0] <= pair[1] + 1e-9));
                assert!(values[2] <= point.cumulative_pnl + 1e-9);
                assert!(point.cumulative_pnl <= values[3] + 1e-9);
            }

            assert!(outcome
                .points
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp));
        }
    }

    #[test]
    fn reingested_forecast_rows_do_not_change_actual_trajectory() {
        let config = ForecastConfig::for_model("scalper");
        let ledger = random_ledger(99, 180);
        let first = ForecastPipeline::new(&config).run(&ledger);

        let mut polluted = ledger.clone();
        for (idx, point) in first.predicted_points().enumerate() {
            let mut row = trade(&format!("f{:03}", idx), point.timestamp, point.cumulative_pnl);
            row.category = point.category.clone();
            polluted.push(row);
        }
        let second = ForecastPipeline::new(&config).run(&polluted);

        let first_actual: Vec<&TrajectoryPoint> = first.actual_points().collect();
        let second_actual: Vec<&TrajectoryPoint> = second.actual_points().collect();
        assert_eq!(first_actual, second_actual);
        assert_eq!(first.summary.forecast_steps, second.summary.forecast_steps);
    }

    #[test]
    fn flat_profits_collapse_bands() {
        let ledger: Vec<TradeRecord> = (0..20)
            .map(|idx| trade(&format!("t{:02}", idx), base() + Duration::hours(idx * 7), 0.5))
            .collect();
        let config = ForecastConfig::for_model("scalper");
        let outcome = ForecastPipeline::new(&config).run(&ledger);
        assert_eq!(outcome.summary.std_dev, Some(0.0));
        for point in outcome.predicted_points() {
            assert!(point
                .bands
                .iter()
                .all(|band| (band.value - point.cumulative_pnl).abs() < 1e-9));
        }
    }

    #[test]
    fn non_finite_profit_is_left_out_of_profile_and_curve() {
        let mut ledger = random_ledger(5, 60);
        ledger[10].net_profit = f64::NAN;
        ledger[30].net_profit = f64::NEG_INFINITY;
        let config = ForecastConfig::for_model("scalper");
        let outcome = ForecastPipeline::new(&config).run(&ledger);

        assert_eq!(outcome.summary.trade_count, 58);
        assert_eq!(outcome.full_profile.count, 58);
        assert_eq!(outcome.actual_points().count(), 58);
        assert!(outcome
            .points
            .iter()
            .all(|point| point.cumulative_pnl.is_finite()));
        assert!(outcome
            .summary
            .final_cumulative_pnl
            .map_or(false, f64::is_finite));
    }
}
