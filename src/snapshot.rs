use crate::ledger::LedgerError;
use crate::models::TradeRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const LEDGER_SNAPSHOT_VERSION: u32 = 1;

/// Offline copy of the ledger so forecasts can run without a database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub trades: Vec<TradeRecord>,
}

impl LedgerSnapshot {
    pub fn new(trades: Vec<TradeRecord>) -> Self {
        Self {
            version: LEDGER_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            trades,
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            LedgerError::Snapshot(format!(
                "failed to open ledger snapshot at {}: {}",
                path.display(),
                err
            ))
        })?;
        let reader = BufReader::new(file);
        let snapshot: LedgerSnapshot = bincode::deserialize_from(reader).map_err(|err| {
            LedgerError::Snapshot(format!("{} could not be decoded: {}", path.display(), err))
        })?;

        if snapshot.version != LEDGER_SNAPSHOT_VERSION {
            return Err(LedgerError::Snapshot(format!(
                "version mismatch in {} (found {}, expected {})",
                path.display(),
                snapshot.version,
                LEDGER_SNAPSHOT_VERSION
            )));
        }

        Ok(snapshot)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Unable to create ledger snapshot at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .context("Failed to serialize ledger snapshot")?;
        writer
            .flush()
            .context("Failed to flush ledger snapshot to disk")?;
        Ok(())
    }
}
