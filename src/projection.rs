use crate::models::PercentileValue;
use crate::statistics::{DistributionProfile, SpreadCoefficients};
use chrono::{DateTime, Duration, Utc};
use log::warn;

/// One projected point past the last realized trade.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub central: f64,
    pub bands: Vec<PercentileValue>,
    pub median_slope: Option<f64>,
}

/// Where the realized curve ends and how it has been trending.
#[derive(Debug, Clone, Copy)]
pub struct ForecastAnchor {
    pub last_time: DateTime<Utc>,
    pub last_cumulative_pnl: f64,
    pub median_slope: Option<f64>,
    pub last_median_slope_value: Option<f64>,
}

pub struct ForecastGenerator<'a> {
    pub full_profile: &'a DistributionProfile,
    pub spread: &'a SpreadCoefficients,
    pub trades_per_day: Option<f64>,
    pub scale_factor: f64,
    pub horizon: Duration,
    pub max_steps: usize,
}

impl ForecastGenerator<'_> {
    /// `max(1, round(trades_per_day * horizon_days))`, capped at `max_steps`.
    pub fn step_count(&self) -> usize {
        let horizon_days = self.horizon.num_milliseconds() as f64 / 86_400_000.0;
        let steps = match self.trades_per_day {
            Some(rate) if rate.is_finite() && rate > 0.0 => {
                let projected = (rate * horizon_days).round();
                if projected >= self.max_steps as f64 {
                    self.max_steps
                } else {
                    projected as usize
                }
            }
            _ => 1,
        };
        steps.clamp(1, self.max_steps.max(1))
    }

    pub fn generate(&self, anchor: &ForecastAnchor) -> Vec<ForecastPoint> {
        let steps = self.step_count();
        let Some(horizon_nanos) = self.horizon.num_nanoseconds().map(i128::from) else {
            warn!(
                "Forecast horizon of {}s cannot be expressed in nanoseconds; no forecast generated",
                self.horizon.num_seconds()
            );
            return Vec::new();
        };

        let median = self.full_profile.median.unwrap_or(0.0);
        let std_dev = self
            .full_profile
            .std_dev
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or(0.0);
        // Per-trade contribution of each tracked percentile.
        let band_profits: Vec<(f64, f64)> = self
            .spread
            .offsets
            .iter()
            .map(|(p, offset)| (*p, median + offset.unwrap_or(0.0) * std_dev))
            .collect();

        (1..=steps)
            .map_while(|step| {
                let offset_nanos =
                    i64::try_from(horizon_nanos * step as i128 / steps as i128).ok()?;
                let timestamp = anchor
                    .last_time
                    .checked_add_signed(Duration::nanoseconds(offset_nanos))?;
                // The first step restates the last realized level.
                let growth_steps = (step - 1) as f64;
                let central =
                    anchor.last_cumulative_pnl + growth_steps * median * self.scale_factor;
                let bands = band_profits
                    .iter()
                    .map(|(percentile, per_trade)| {
                        PercentileValue::new(
                            *percentile,
                            anchor.last_cumulative_pnl
                                + growth_steps * per_trade * self.scale_factor,
                        )
                    })
                    .collect();
                let median_slope = anchor
                    .last_median_slope_value
                    .zip(anchor.median_slope)
                    .map(|(last, k)| last + step as f64 * k);

                Some(ForecastPoint {
                    timestamp,
                    central,
                    bands,
                    median_slope,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PERCENTILES: [f64; 6] = [0.01, 0.05, 0.25, 0.75, 0.95, 0.99];

    fn profile(median: Option<f64>, std_dev: Option<f64>) -> DistributionProfile {
        DistributionProfile {
            count: 10,
            std_dev,
            median,
            percentiles: PERCENTILES.iter().map(|p| (*p, None)).collect(),
        }
    }

    fn spread(offsets: [f64; 6]) -> SpreadCoefficients {
        SpreadCoefficients {
            window_len: 10,
            profile: profile(Some(0.0), Some(1.0)),
            offsets: PERCENTILES
                .iter()
                .zip(offsets)
                .map(|(p, offset)| (*p, Some(offset)))
                .collect(),
        }
    }

    fn undefined_spread() -> SpreadCoefficients {
        SpreadCoefficients {
            window_len: 1,
            profile: profile(Some(0.0), None),
            offsets: PERCENTILES.iter().map(|p| (*p, None)).collect(),
        }
    }

    fn anchor() -> ForecastAnchor {
        ForecastAnchor {
            last_time: Utc.with_ymd_and_hms(2024, 6, 10, 15, 30, 0).unwrap(),
            last_cumulative_pnl: 25.0,
            median_slope: Some(7.5),
            last_median_slope_value: Some(25.0),
        }
    }

    fn generator<'a>(
        full: &'a DistributionProfile,
        spread: &'a SpreadCoefficients,
        trades_per_day: Option<f64>,
    ) -> ForecastGenerator<'a> {
        ForecastGenerator {
            full_profile: full,
            spread,
            trades_per_day,
            scale_factor: 10.0,
            horizon: Duration::days(3),
            max_steps: 500,
        }
    }

    #[test]
    fn undefined_cadence_yields_one_point_at_horizon() {
        let full = profile(Some(1.0), Some(1.0));
        let spread = undefined_spread();
        let points = generator(&full, &spread, None).generate(&anchor());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp, anchor().last_time + Duration::days(3));
        assert!((points[0].central - 25.0).abs() < 1e-12);
        assert_eq!(points[0].median_slope, Some(32.5));
    }

    #[test]
    fn steps_follow_cadence_and_cover_horizon_exactly() {
        let full = profile(Some(1.0), Some(2.0));
        let spread = spread([-2.0, -1.5, -0.5, 0.5, 1.5, 2.0]);
        // 2.4 trades/day * 3 days = 7.2 -> 7 steps; 3 days is not divisible by 7 in ms.
        let gen = generator(&full, &spread, Some(2.4));
        assert_eq!(gen.step_count(), 7);
        let points = gen.generate(&anchor());
        assert_eq!(points.len(), 7);
        assert!(points
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
        assert!(points[0].timestamp > anchor().last_time);
        assert_eq!(points[6].timestamp, anchor().last_time + Duration::days(3));
    }

    #[test]
    fn central_estimate_grows_from_second_step() {
        let full = profile(Some(1.0), Some(2.0));
        let spread = spread([-2.0, -1.5, -0.5, 0.5, 1.5, 2.0]);
        let points = generator(&full, &spread, Some(1.0)).generate(&anchor());
        assert_eq!(points.len(), 3);
        let central: Vec<f64> = points.iter().map(|p| p.central).collect();
        assert_eq!(central, vec![25.0, 35.0, 45.0]);
        let slope_line: Vec<Option<f64>> = points.iter().map(|p| p.median_slope).collect();
        assert_eq!(slope_line, vec![Some(32.5), Some(40.0), Some(47.5)]);

        // p05 per trade = 1 + (-1.5 * 2) = -2; two growth steps at scale 10.
        let p05 = points[2]
            .bands
            .iter()
            .find(|band| (band.percentile - 0.05).abs() < 1e-12)
            .unwrap();
        assert!((p05.value - (25.0 - 40.0)).abs() < 1e-9);
    }

    #[test]
    fn bands_are_ordered_around_central() {
        let full = profile(Some(0.4), Some(3.0));
        let spread = spread([-2.3, -1.6, -0.6, 0.7, 1.7, 2.5]);
        for point in generator(&full, &spread, Some(5.0)).generate(&anchor()) {
            let values: Vec<f64> = point.bands.iter().map(|band| band.value).collect();
            assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
            assert!(values[2] <= point.central && point.central <= values[3]);
        }
    }

    #[test]
    fn zero_or_missing_std_dev_collapses_bands() {
        let spread = spread([-2.0, -1.5, -0.5, 0.5, 1.5, 2.0]);
        for full in [profile(Some(1.0), Some(0.0)), profile(Some(1.0), None)] {
            for point in generator(&full, &spread, Some(2.0)).generate(&anchor()) {
                assert!(point
                    .bands
                    .iter()
                    .all(|band| (band.value - point.central).abs() < 1e-12));
            }
        }
    }

    #[test]
    fn undefined_offsets_collapse_bands() {
        let full = profile(Some(1.0), Some(4.0));
        let spread = undefined_spread();
        for point in generator(&full, &spread, Some(2.0)).generate(&anchor()) {
            assert_eq!(point.bands.len(), 6);
            assert!(point
                .bands
                .iter()
                .all(|band| (band.value - point.central).abs() < 1e-12));
        }
    }

    #[test]
    fn step_count_is_bounded() {
        let full = profile(Some(1.0), Some(1.0));
        let spread = undefined_spread();
        let mut gen = generator(&full, &spread, Some(10_000.0));
        gen.max_steps = 40;
        assert_eq!(gen.step_count(), 40);
        gen.trades_per_day = Some(0.01);
        assert_eq!(gen.step_count(), 1);
    }

    #[test]
    fn missing_median_slope_leaves_continuation_undefined() {
        let full = profile(Some(1.0), Some(1.0));
        let spread = undefined_spread();
        let mut anchor = anchor();
        anchor.median_slope = None;
        let points = generator(&full, &spread, Some(1.0)).generate(&anchor);
        assert!(points.iter().all(|p| p.median_slope.is_none()));
    }

    #[test]
    fn long_horizons_never_land_before_last_trade() {
        let full = profile(Some(1.0), Some(1.0));
        let spread = undefined_spread();
        let mut gen = generator(&full, &spread, Some(1.0));

        gen.horizon = Duration::days(200_000);
        assert!(gen.generate(&anchor()).is_empty());

        gen.horizon = Duration::days(100_000);
        let points = gen.generate(&anchor());
        assert_eq!(points.len(), gen.max_steps);
        assert!(points.iter().all(|p| p.timestamp > anchor().last_time));
        assert_eq!(
            points[points.len() - 1].timestamp,
            anchor().last_time + Duration::days(100_000)
        );
    }
}
