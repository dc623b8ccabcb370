use crate::context::{AppContext, LedgerSource};
use crate::snapshot::LedgerSnapshot;
use anyhow::Result;
use log::info;
use std::path::Path;

pub async fn run(app: &AppContext, model_pattern: &str, output_path: &Path) -> Result<()> {
    info!(
        "Generating ledger snapshot at {}",
        output_path.display()
    );

    let trades = app.load_ledger(model_pattern, &LedgerSource::Database).await?;
    let count = trades.len();
    LedgerSnapshot::new(trades).save_to_file(output_path)?;
    info!(
        "Ledger snapshot with {} trade(s) written to {}",
        count,
        output_path.display()
    );

    Ok(())
}
