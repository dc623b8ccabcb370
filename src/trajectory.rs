use crate::models::TradeRecord;
use chrono::{DateTime, Utc};

/// One realized trade on the cumulative PnL curve.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualPoint {
    pub close_time: DateTime<Utc>,
    pub trade_id: String,
    pub category: String,
    pub cumulative_pnl: f64,
    /// 1-based rank among non-forecast trades.
    pub index: Option<usize>,
    pub regression: Option<f64>,
    pub median_slope: Option<f64>,
    pub median_regression: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActualTrajectory {
    pub points: Vec<ActualPoint>,
    /// Least-squares slope `b` of cumulative PnL over trade index.
    pub regression_slope: Option<f64>,
    /// Slope `k` between the first and last indexed cumulative values.
    pub median_slope: Option<f64>,
}

impl ActualTrajectory {
    pub fn last(&self) -> Option<&ActualPoint> {
        self.points.last()
    }

    /// Median-slope line value at the last indexed point; the forecast continues from it.
    pub fn last_median_slope_value(&self) -> Option<f64> {
        self.points.iter().rev().find_map(|point| point.median_slope)
    }

    pub fn final_cumulative_pnl(&self) -> Option<f64> {
        self.points.last().map(|point| point.cumulative_pnl)
    }
}

pub struct TrajectoryBuilder<'a> {
    scale_factor: f64,
    median_net_profit: Option<f64>,
    forecast_category: &'a str,
}

impl<'a> TrajectoryBuilder<'a> {
    pub fn new(
        scale_factor: f64,
        median_net_profit: Option<f64>,
        forecast_category: &'a str,
    ) -> Self {
        Self {
            scale_factor,
            median_net_profit,
            forecast_category,
        }
    }

    /// `trades` must already be in `(close_time, id)` order.
    pub fn build(&self, trades: &[TradeRecord]) -> ActualTrajectory {
        let cumulative = self.cumulative_pnl(trades);
        let indices = self.trade_indices(trades);

        let indexed: Vec<(f64, f64)> = indices
            .iter()
            .zip(&cumulative)
            .filter_map(|(index, cum)| index.map(|t| (t as f64, *cum)))
            .collect();

        let regression_slope = least_squares_slope(&indexed);
        let median_line = MedianSlopeLine::through(&indexed);

        let points = trades
            .iter()
            .zip(cumulative)
            .zip(indices)
            .map(|((trade, cumulative_pnl), index)| {
                let t = index.map(|value| value as f64);
                ActualPoint {
                    close_time: trade.close_time,
                    trade_id: trade.id.clone(),
                    category: trade.category.clone(),
                    cumulative_pnl,
                    index,
                    regression: t.zip(regression_slope).map(|(t, b)| b * t),
                    median_slope: t
                        .zip(median_line.as_ref())
                        .map(|(t, line)| line.value_at(t)),
                    median_regression: t
                        .zip(self.median_net_profit)
                        .map(|(t, median)| t * median * self.scale_factor),
                }
            })
            .collect();

        ActualTrajectory {
            points,
            regression_slope,
            median_slope: median_line.map(|line| line.slope),
        }
    }

    fn cumulative_pnl(&self, trades: &[TradeRecord]) -> Vec<f64> {
        trades
            .iter()
            .scan(0.0, |running, trade| {
                *running += trade.net_profit * self.scale_factor;
                Some(*running)
            })
            .collect()
    }

    fn trade_indices(&self, trades: &[TradeRecord]) -> Vec<Option<usize>> {
        let mut next = 0usize;
        trades
            .iter()
            .map(|trade| {
                if trade.has_category(self.forecast_category) {
                    None
                } else {
                    next += 1;
                    Some(next)
                }
            })
            .collect()
    }
}

/// `b = (n·Σty − Σt·Σy) / (n·Σt² − (Σt)²)`.
pub fn least_squares_slope(samples: &[(f64, f64)]) -> Option<f64> {
    let n = samples.len() as f64;
    let (sum_t, sum_y, sum_ty, sum_tt) = samples.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sum_t, sum_y, sum_ty, sum_tt), (t, y)| {
            (sum_t + t, sum_y + y, sum_ty + t * y, sum_tt + t * t)
        },
    );
    let denominator = n * sum_tt - sum_t * sum_t;
    if denominator == 0.0 {
        return None;
    }
    let slope = (n * sum_ty - sum_t * sum_y) / denominator;
    slope.is_finite().then_some(slope)
}

#[derive(Debug, Clone, Copy)]
struct MedianSlopeLine {
    anchor_index: f64,
    anchor_value: f64,
    slope: f64,
}

impl MedianSlopeLine {
    fn through(samples: &[(f64, f64)]) -> Option<Self> {
        let (first_t, first_y) = *samples.first()?;
        let (last_t, last_y) = *samples.last()?;
        if last_t == first_t {
            return None;
        }
        Some(Self {
            anchor_index: first_t,
            anchor_value: first_y,
            slope: (last_y - first_y) / (last_t - first_t),
        })
    }

    fn value_at(&self, t: f64) -> f64 {
        self.anchor_value + (t - self.anchor_index) * self.slope
    }
}
