use crate::models::TradeRecord;
use statrs::statistics::Statistics;
use std::cmp::Ordering;

/// Net profit distribution over a set of trades. Every field that needs more data than
/// the set provides is `None` rather than zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionProfile {
    pub count: usize,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
    /// `(percentile, value)` in the order the percentiles were requested.
    pub percentiles: Vec<(f64, Option<f64>)>,
}

impl DistributionProfile {
    pub fn percentile(&self, percentile: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(p, _)| (p - percentile).abs() < 1e-12)
            .and_then(|(_, value)| *value)
    }
}

/// Recent-window percentile offsets expressed in recent standard deviations.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadCoefficients {
    pub window_len: usize,
    pub profile: DistributionProfile,
    pub offsets: Vec<(f64, Option<f64>)>,
}

impl SpreadCoefficients {
    pub fn offset(&self, percentile: f64) -> Option<f64> {
        self.offsets
            .iter()
            .find(|(p, _)| (p - percentile).abs() < 1e-12)
            .and_then(|(_, value)| *value)
    }

    pub fn is_defined(&self) -> bool {
        self.offsets.iter().any(|(_, value)| value.is_some())
    }
}

pub fn full_profile(trades: &[TradeRecord], percentiles: &[f64]) -> DistributionProfile {
    let values: Vec<f64> = trades.iter().map(|trade| trade.net_profit).collect();
    profile_of(&values, percentiles)
}

/// Normalized percentile offsets over the `window_size` most recent trades.
pub fn recent_profile(
    trades: &[TradeRecord],
    window_size: usize,
    percentiles: &[f64],
) -> SpreadCoefficients {
    let mut recent: Vec<&TradeRecord> = trades.iter().collect();
    recent.sort_by(|a, b| b.ordering_key_cmp(a));
    recent.truncate(window_size);

    let values: Vec<f64> = recent.iter().map(|trade| trade.net_profit).collect();
    let profile = profile_of(&values, percentiles);

    let scale = match (profile.median, profile.std_dev) {
        (Some(median), Some(std_dev)) if values.len() >= 2 && std_dev > 0.0 => {
            Some((median, std_dev))
        }
        _ => None,
    };
    let offsets = profile
        .percentiles
        .iter()
        .map(|(p, value)| {
            let offset = match (scale, value) {
                (Some((median, std_dev)), Some(value)) => Some((value - median) / std_dev),
                _ => None,
            };
            (*p, offset)
        })
        .collect();

    SpreadCoefficients {
        window_len: values.len(),
        profile,
        offsets,
    }
}

fn profile_of(values: &[f64], percentiles: &[f64]) -> DistributionProfile {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    DistributionProfile {
        count: sorted.len(),
        std_dev: sample_std_dev(&sorted),
        median: percentile_cont(&sorted, 0.5),
        percentiles: percentiles
            .iter()
            .map(|p| (*p, percentile_cont(&sorted, *p)))
            .collect(),
    }
}

fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let std_dev = values.std_dev();
    std_dev.is_finite().then_some(std_dev)
}

/// Continuous percentile of ascending `sorted`: linear interpolation between the order
/// statistics around rank `p * (n - 1)`.
pub fn percentile_cont(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
