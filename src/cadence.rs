use crate::models::TradeRecord;

/// Average trades closed per calendar day across the set's date span.
///
/// Only the UTC date of the first and last close counts, so a set closing entirely within
/// one day has no defined cadence.
pub fn avg_trades_per_day(trades: &[TradeRecord]) -> Option<f64> {
    let first = trades.iter().map(|trade| trade.close_time).min()?;
    let last = trades.iter().map(|trade| trade.close_time).max()?;
    let elapsed_days = (last.date_naive() - first.date_naive()).num_days();
    if elapsed_days <= 0 {
        return None;
    }
    Some(trades.len() as f64 / elapsed_days as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeDetails;
    use chrono::{DateTime, TimeZone, Utc};

    fn closed_at(id: &str, close_time: DateTime<Utc>) -> TradeRecord {
        TradeRecord {
            id: id.to_string(),
            symbol: "SOLUSDT".to_string(),
            model_id: "m".to_string(),
            category: "auto".to_string(),
            open_time: close_time,
            close_time,
            net_profit: 0.0,
            details: TradeDetails::default(),
        }
    }

    #[test]
    fn counts_whole_calendar_days() {
        let trades = vec![
            closed_at("a", Utc.with_ymd_and_hms(2024, 2, 1, 23, 59, 0).unwrap()),
            closed_at("b", Utc.with_ymd_and_hms(2024, 2, 2, 0, 1, 0).unwrap()),
            closed_at("c", Utc.with_ymd_and_hms(2024, 2, 3, 12, 0, 0).unwrap()),
            closed_at("d", Utc.with_ymd_and_hms(2024, 2, 5, 1, 0, 0).unwrap()),
        ];
        // 4 trades over 4 calendar days (Feb 1 -> Feb 5).
        assert!((avg_trades_per_day(&trades).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn two_minutes_across_midnight_is_one_day() {
        let trades = vec![
            closed_at("a", Utc.with_ymd_and_hms(2024, 2, 1, 23, 59, 0).unwrap()),
            closed_at("b", Utc.with_ymd_and_hms(2024, 2, 2, 0, 1, 0).unwrap()),
        ];
        assert!((avg_trades_per_day(&trades).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn same_day_and_empty_sets_are_undefined() {
        let trades = vec![
            closed_at("a", Utc.with_ymd_and_hms(2024, 2, 1, 1, 0, 0).unwrap()),
            closed_at("b", Utc.with_ymd_and_hms(2024, 2, 1, 22, 0, 0).unwrap()),
        ];
        assert_eq!(avg_trades_per_day(&trades), None);
        assert_eq!(avg_trades_per_day(&[]), None);
    }
}
