use crate::ledger::LedgerQuery;
use crate::models::{TradeDetails, TradeRecord, TrajectoryPoint};
use crate::pipeline::ForecastSummary;
use anyhow::{Context, Result};
use chrono::Utc;
use log::error;
use std::collections::HashMap;
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

const TRADE_COLUMNS: &str = "id, symbol, model_id, category, open_time, close_time, net_profit, side, quantity, open_price, close_price, commission, funding, max_drawdown, max_runup";

pub struct Database {
    client: Client,
}

impl Database {
    pub async fn new<S: AsRef<str>>(database_url: S) -> Result<Self> {
        let database_url = database_url.as_ref().to_string();
        let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
            .await
            .with_context(|| format!("failed to connect to PostgreSQL at {}", database_url))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("PostgreSQL connection error: {}", err);
            }
        });

        Ok(Self { client })
    }

    pub async fn get_all_settings(&self) -> Result<HashMap<String, String>> {
        let rows = self
            .client
            .query("SELECT setting_key, value FROM settings", &[])
            .await?;
        let mut settings = HashMap::with_capacity(rows.len());
        for row in rows {
            settings.insert(row.get::<_, String>(0), row.get::<_, String>(1));
        }
        Ok(settings)
    }

    /// Closed trades for one model, filtered and ordered the same way `filter_trades` does.
    pub async fn get_model_trades(&self, query: &LedgerQuery) -> Result<Vec<TradeRecord>> {
        let excluded = query.excluded_categories_normalized();
        let sql = format!(
            "SELECT {TRADE_COLUMNS}
             FROM closed_trades
             WHERE strpos(model_id, $1) > 0
               AND ($2::timestamptz IS NULL OR close_time >= $2)
               AND NOT (lower(trim(category)) = ANY($3))
             ORDER BY close_time, id"
        );
        let rows = self
            .client
            .query(sql.as_str(), &[&query.model_pattern, &query.since, &excluded])
            .await
            .with_context(|| format!("ledger query failed for model '{}'", query.model_pattern))?;

        Ok(rows.iter().map(Self::map_trade_row).collect())
    }

    /// Every trade whose model id contains `model_pattern`, regardless of category.
    pub async fn get_ledger(&self, model_pattern: &str) -> Result<Vec<TradeRecord>> {
        let sql = format!(
            "SELECT {TRADE_COLUMNS}
             FROM closed_trades
             WHERE strpos(model_id, $1) > 0
             ORDER BY close_time, id"
        );
        let rows = self
            .client
            .query(sql.as_str(), &[&model_pattern])
            .await
            .context("ledger export query failed")?;
        Ok(rows.iter().map(Self::map_trade_row).collect())
    }

    pub async fn insert_trades(&mut self, trades: &[TradeRecord]) -> Result<()> {
        if trades.is_empty() {
            return Ok(());
        }

        let tx = self.client.transaction().await?;
        for trade in trades {
            let details = &trade.details;
            tx.execute(
                "INSERT INTO closed_trades (id, symbol, model_id, category, open_time, close_time, net_profit, side, quantity, open_price, close_price, commission, funding, max_drawdown, max_runup)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                &[
                    &trade.id,
                    &trade.symbol,
                    &trade.model_id,
                    &trade.category,
                    &trade.open_time,
                    &trade.close_time,
                    &trade.net_profit,
                    &details.side,
                    &details.quantity,
                    &details.open_price,
                    &details.close_price,
                    &details.commission,
                    &details.funding,
                    &details.max_drawdown,
                    &details.max_runup,
                ],
            )
            .await
            .with_context(|| format!("failed to insert trade {}", trade.id))?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Replaces the stored trajectory for `summary.model_pattern` and returns the new run id.
    pub async fn replace_model_forecast(
        &mut self,
        summary: &ForecastSummary,
        points: &[TrajectoryPoint],
    ) -> Result<String> {
        let run_id = Uuid::new_v4().to_string();
        let generated_at = Utc::now();
        let summary_json =
            serde_json::to_string(summary).context("failed to serialize forecast summary")?;
        let trade_count = summary.trade_count as i32;
        let forecast_steps = summary.forecast_steps as i32;

        let tx = self.client.transaction().await?;
        tx.execute(
            "DELETE FROM forecast_runs WHERE model_pattern = $1",
            &[&summary.model_pattern],
        )
        .await?;
        tx.execute(
            "INSERT INTO forecast_runs (id, model_pattern, generated_at, trade_count, forecast_steps, summary)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &run_id,
                &summary.model_pattern,
                &generated_at,
                &trade_count,
                &forecast_steps,
                &summary_json,
            ],
        )
        .await?;

        let statement = tx
            .prepare(
                "INSERT INTO forecast_points (run_id, seq, point_time, label, category, trade_id, cumulative_pnl, bands, regression, median_slope, median_regression)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .await?;
        for (seq, point) in points.iter().enumerate() {
            let seq = seq as i32;
            let label = point.label.as_str();
            let bands =
                serde_json::to_string(&point.bands).context("failed to serialize forecast bands")?;
            tx.execute(
                &statement,
                &[
                    &run_id,
                    &seq,
                    &point.timestamp,
                    &label,
                    &point.category,
                    &point.trade_id,
                    &point.cumulative_pnl,
                    &bands,
                    &point.regression,
                    &point.median_slope,
                    &point.median_regression,
                ],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(run_id)
    }

    pub async fn count_forecast_points(&self, model_pattern: &str) -> Result<i64> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*)
                 FROM forecast_points p
                 INNER JOIN forecast_runs r ON r.id = p.run_id
                 WHERE r.model_pattern = $1",
                &[&model_pattern],
            )
            .await?;
        Ok(row.get(0))
    }

    fn map_trade_row(row: &Row) -> TradeRecord {
        TradeRecord {
            id: row.get(0),
            symbol: row.get(1),
            model_id: row.get(2),
            category: row.get(3),
            open_time: row.get(4),
            close_time: row.get(5),
            net_profit: row.get(6),
            details: TradeDetails {
                side: row.get(7),
                quantity: row.get(8),
                open_price: row.get(9),
                close_price: row.get(10),
                commission: row.get(11),
                funding: row.get(12),
                max_drawdown: row.get(13),
                max_runup: row.get(14),
            },
        }
    }
}
