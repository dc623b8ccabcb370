use crate::config::{ForecastConfig, ForecastOverrides};
use crate::database::Database;
use crate::ledger::{filter_trades, LedgerError};
use crate::models::TradeRecord;
use crate::retry::retry_ledger_operation;
use crate::snapshot::LedgerSnapshot;
use anyhow::{anyhow, Result};
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a command reads trades from.
#[derive(Clone, Debug)]
pub enum LedgerSource {
    Database,
    Snapshot(PathBuf),
}

impl LedgerSource {
    pub fn from_cli(ledger_file: Option<PathBuf>) -> Self {
        match ledger_file {
            Some(path) => Self::Snapshot(path),
            None => Self::Database,
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    database_url: Option<String>,
}

impl AppContext {
    pub async fn initialize(database_url: Option<String>) -> Result<Self> {
        let database_url = database_url.filter(|url| !url.trim().is_empty());
        Ok(Self { database_url })
    }

    pub fn has_database(&self) -> bool {
        self.database_url.is_some()
    }

    pub async fn database(&self) -> Result<Database> {
        let Some(database_url) = self.database_url.as_deref() else {
            return Err(anyhow!(
                "DATABASE_URL must be set to use database-backed forecast commands."
            ));
        };
        Database::new(database_url).await
    }

    /// Connects with retries; an unreachable store becomes `LedgerError::Unavailable`.
    pub async fn ledger_database(&self) -> Result<Database, LedgerError> {
        let Some(database_url) = self.database_url.as_deref() else {
            return Err(LedgerError::Unavailable(
                "DATABASE_URL is not set and no ledger snapshot was given".to_string(),
            ));
        };
        retry_ledger_operation!("ledger connection", Database::new(database_url))
            .map_err(|err| LedgerError::Unavailable(format!("{:#}", err)))
    }

    /// Settings from the database when one is configured, otherwise empty.
    pub async fn settings(&self) -> HashMap<String, String> {
        if !self.has_database() {
            return HashMap::new();
        }
        let loaded = match self.database().await {
            Ok(db) => db.get_all_settings().await,
            Err(err) => Err(err),
        };
        match loaded {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Forecast settings unavailable ({:#}); using defaults", err);
                HashMap::new()
            }
        }
    }

    pub async fn forecast_config(
        &self,
        model_pattern: &str,
        overrides: &ForecastOverrides,
    ) -> Result<ForecastConfig> {
        let settings = self.settings().await;
        ForecastConfig::from_settings_map(model_pattern, &settings)?.apply_overrides(overrides)
    }

    /// Filtered, ordered trades for `config` from the chosen source.
    pub async fn load_filtered_trades(
        &self,
        config: &ForecastConfig,
        source: &LedgerSource,
    ) -> Result<Vec<TradeRecord>, LedgerError> {
        let query = config.ledger_query();
        let trades = match source {
            LedgerSource::Snapshot(path) => load_snapshot(path)?.trades,
            LedgerSource::Database => {
                let db = self.ledger_database().await?;
                retry_ledger_operation!(
                    format!("ledger query for '{}'", query.model_pattern),
                    db.get_model_trades(&query)
                )
                .map_err(|err| LedgerError::Unavailable(format!("{:#}", err)))?
            }
        };
        let filtered = filter_trades(&trades, &query);
        info!(
            "Loaded {} trade(s) for '{}' ({} after filtering)",
            trades.len(),
            query.model_pattern,
            filtered.len()
        );
        Ok(filtered)
    }

    /// Unfiltered ledger, for batch runs that filter per model themselves.
    pub async fn load_ledger(
        &self,
        model_pattern: &str,
        source: &LedgerSource,
    ) -> Result<Vec<TradeRecord>, LedgerError> {
        match source {
            LedgerSource::Snapshot(path) => Ok(load_snapshot(path)?.trades),
            LedgerSource::Database => {
                let db = self.ledger_database().await?;
                retry_ledger_operation!(
                    format!("ledger export for '{}'", model_pattern),
                    db.get_ledger(model_pattern)
                )
                .map_err(|err| LedgerError::Unavailable(format!("{:#}", err)))
            }
        }
    }
}

fn load_snapshot(path: &Path) -> Result<LedgerSnapshot, LedgerError> {
    let snapshot = LedgerSnapshot::load_from_file(path)?;
    info!(
        "Loaded ledger snapshot {} ({} trades, generated {})",
        path.display(),
        snapshot.trades.len(),
        snapshot.generated_at.format("%Y-%m-%d %H:%M")
    );
    Ok(snapshot)
}
