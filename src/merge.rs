use crate::models::{PointLabel, TradeRecord, TrajectoryPoint};
use crate::projection::ForecastPoint;
use crate::trajectory::ActualTrajectory;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Joins realized and projected points into one series ordered by timestamp, attaching the
/// trade closed at each point's timestamp where that trade can be identified.
pub fn merge_trajectory(
    actual: &ActualTrajectory,
    forecast: &[ForecastPoint],
    trades: &[TradeRecord],
    forecast_category: &str,
) -> Vec<TrajectoryPoint> {
    let mut by_close_time: HashMap<DateTime<Utc>, Vec<&TradeRecord>> = HashMap::new();
    for trade in trades {
        by_close_time.entry(trade.close_time).or_default().push(trade);
    }

    let mut points: Vec<TrajectoryPoint> = Vec::with_capacity(actual.points.len() + forecast.len());

    for point in &actual.points {
        points.push(TrajectoryPoint {
            timestamp: point.close_time,
            label: PointLabel::Real,
            category: point.category.clone(),
            trade_id: Some(point.trade_id.clone()),
            cumulative_pnl: point.cumulative_pnl,
            bands: Vec::new(),
            regression: point.regression,
            median_slope: point.median_slope,
            median_regression: point.median_regression,
            trade: None,
        });
    }

    for point in forecast {
        points.push(TrajectoryPoint {
            timestamp: point.timestamp,
            label: PointLabel::Predicted,
            category: forecast_category.to_string(),
            trade_id: None,
            cumulative_pnl: point.central,
            bands: point.bands.clone(),
            regression: None,
            median_slope: point.median_slope,
            median_regression: None,
            trade: None,
        });
    }

    points.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.is_predicted().cmp(&b.is_predicted()))
            .then_with(|| a.trade_id.cmp(&b.trade_id))
    });

    for point in &mut points {
        let Some(candidates) = by_close_time.get(&point.timestamp) else {
            continue;
        };
        let matched = match point.trade_id.as_deref() {
            Some(trade_id) => candidates.iter().find(|trade| trade.id == trade_id),
            None if candidates.len() == 1 => candidates.first(),
            None => None,
        };
        point.trade = matched.map(|trade| (*trade).clone());
        if !point.is_predicted() {
            if let Some(trade) = &point.trade {
                point.category = trade.category.clone();
            }
        }
    }

    points
}
