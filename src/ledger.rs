use crate::models::TradeRecord;
use chrono::{DateTime, Utc};
use log::warn;
use std::collections::BTreeSet;
use thiserror::Error;

/// The only failure the forecast treats as fatal: no trades could be read at all.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
    #[error("ledger snapshot unreadable: {0}")]
    Snapshot(String),
}

#[derive(Debug, Clone)]
pub struct LedgerQuery {
    /// Substring matched against the trade's model id.
    pub model_pattern: String,
    /// Minimum close time, inclusive.
    pub since: Option<DateTime<Utc>>,
    pub excluded_categories: Vec<String>,
    /// Always excluded so earlier forecast output re-ingested into the ledger is ignored.
    pub forecast_category: String,
}

impl LedgerQuery {
    pub fn matches(&self, trade: &TradeRecord) -> bool {
        if !trade.model_id.contains(self.model_pattern.as_str()) {
            return false;
        }
        if let Some(since) = self.since {
            if trade.close_time < since {
                return false;
            }
        }
        if trade.has_category(&self.forecast_category) {
            return false;
        }
        !self
            .excluded_categories
            .iter()
            .any(|category| trade.has_category(category))
    }

    /// Lowercased exclusion list, sentinel included, as sent to the database.
    pub fn excluded_categories_normalized(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .excluded_categories
            .iter()
            .map(|category| category.trim().to_ascii_lowercase())
            .filter(|category| !category.is_empty())
            .collect();
        let sentinel = self.forecast_category.trim().to_ascii_lowercase();
        if !categories.contains(&sentinel) {
            categories.push(sentinel);
        }
        categories
    }
}

/// Selects the trades a forecast run works on, ordered by `(close_time, id)`.
/// Trades with a non-finite net profit are dropped.
pub fn filter_trades(records: &[TradeRecord], query: &LedgerQuery) -> Vec<TradeRecord> {
    let mut non_finite = 0usize;
    let mut filtered: Vec<TradeRecord> = records
        .iter()
        .filter(|trade| query.matches(trade))
        .filter(|trade| {
            let finite = trade.net_profit.is_finite();
            if !finite {
                non_finite += 1;
            }
            finite
        })
        .cloned()
        .collect();
    if non_finite > 0 {
        warn!(
            "Skipped {} trade(s) for '{}' with a non-finite net profit",
            non_finite, query.model_pattern
        );
    }
    filtered.sort_by(|a, b| a.ordering_key_cmp(b));
    filtered
}

/// Distinct model ids present in a ledger, sorted.
pub fn distinct_models(records: &[TradeRecord]) -> Vec<String> {
    records
        .iter()
        .map(|trade| trade.model_id.trim())
        .filter(|model| !model.is_empty())
        .map(|model| model.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
