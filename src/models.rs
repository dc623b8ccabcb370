use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Descriptive fields of a closed trade. The forecast never transforms these, it only carries
/// them through to the matching trajectory point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDetails {
    pub side: Option<String>,
    pub quantity: Option<f64>,
    pub open_price: Option<f64>,
    pub close_price: Option<f64>,
    pub commission: Option<f64>,
    pub funding: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub max_runup: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub model_id: String,
    pub category: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub net_profit: f64,
    pub details: TradeDetails,
}

impl TradeRecord {
    /// Total order used everywhere trades are sequenced: close time, then id.
    pub fn ordering_key_cmp(&self, other: &Self) -> Ordering {
        self.close_time
            .cmp(&other.close_time)
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.category.trim().eq_ignore_ascii_case(category.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointLabel {
    Real,
    Predicted,
}

impl PointLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointLabel::Real => "real",
            PointLabel::Predicted => "predicted",
        }
    }
}

/// One band column; `label` names it in exported output (`p05`, `p95`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub label: String,
    pub percentile: f64,
    pub value: f64,
}

impl PercentileValue {
    pub fn new(percentile: f64, value: f64) -> Self {
        Self {
            label: percentile_label(percentile),
            percentile,
            value,
        }
    }
}

/// `0.05` -> `p05`, `0.995` -> `p99.5`.
pub fn percentile_label(percentile: f64) -> String {
    let scaled = percentile * 100.0;
    if (scaled - scaled.round()).abs() < 1e-9 {
        format!("p{:02}", scaled.round() as i64)
    } else {
        format!("p{}", scaled)
    }
}

/// One row of the combined actual + forecast series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub timestamp: DateTime<Utc>,
    pub label: PointLabel,
    pub category: String,
    pub trade_id: Option<String>,
    pub cumulative_pnl: f64,
    pub bands: Vec<PercentileValue>,
    pub regression: Option<f64>,
    pub median_slope: Option<f64>,
    pub median_regression: Option<f64>,
    pub trade: Option<TradeRecord>,
}

impl TrajectoryPoint {
    pub fn is_predicted(&self) -> bool {
        self.label == PointLabel::Predicted
    }

    pub fn band(&self, percentile: f64) -> Option<f64> {
        self.bands
            .iter()
            .find(|band| (band.percentile - percentile).abs() < 1e-12)
            .map(|band| band.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_labels_are_zero_padded() {
        assert_eq!(percentile_label(0.01), "p01");
        assert_eq!(percentile_label(0.25), "p25");
        assert_eq!(percentile_label(0.99), "p99");
        assert_eq!(percentile_label(0.995), "p99.5");
    }

    #[test]
    fn band_columns_are_named_in_json() {
        let band = PercentileValue::new(0.05, -12.5);
        let json = serde_json::to_value(&band).unwrap();
        assert_eq!(json["label"], "p05");
        assert_eq!(json["percentile"], 0.05);
        assert_eq!(json["value"], -12.5);
    }

    #[test]
    fn category_match_ignores_case_and_padding() {
        let trade = TradeRecord {
            id: "t1".to_string(),
            symbol: "BTCUSDT".to_string(),
            model_id: "momentum-v2".to_string(),
            category: " Manual ".to_string(),
            open_time: Utc::now(),
            close_time: Utc::now(),
            net_profit: 1.0,
            details: TradeDetails::default(),
        };
        assert!(trade.has_category("manual"));
        assert!(!trade.has_category("error"));
    }
}
