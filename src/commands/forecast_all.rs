use crate::config::{ForecastConfig, ForecastOverrides};
use crate::context::{AppContext, LedgerSource};
use crate::export::{default_output_path, write_trajectory_json};
use crate::ledger::distinct_models;
use crate::models::TradeRecord;
use crate::pipeline::{ForecastPipeline, ForecastSummary};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct ForecastAllRequest {
    pub source: LedgerSource,
    pub output_dir: PathBuf,
    pub overrides: ForecastOverrides,
}

/// Forecasts every model in the ledger. Trades are grouped by exact model id first, so each
/// pipeline owns its snapshot and `m1` never picks up `m10`.
pub async fn run(app: &AppContext, request: &ForecastAllRequest) -> Result<Vec<ForecastSummary>> {
    let ledger = app.load_ledger("", &request.source).await?;
    let models = distinct_models(&ledger);
    if models.is_empty() {
        info!("Ledger contains no models to forecast");
        return Ok(Vec::new());
    }

    let settings = app.settings().await;
    let configs = models
        .iter()
        .map(|model| {
            ForecastConfig::from_settings_map(model, &settings)?.apply_overrides(&request.overrides)
        })
        .collect::<Result<Vec<_>>>()?;
    info!("Forecasting {} model(s) from {} trade(s)", configs.len(), ledger.len());

    let mut by_model: HashMap<&str, Vec<TradeRecord>> = HashMap::new();
    for trade in &ledger {
        by_model
            .entry(trade.model_id.trim())
            .or_default()
            .push(trade.clone());
    }

    let pb = ProgressBar::new(configs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let results: Vec<Result<ForecastSummary>> = configs
        .par_iter()
        .map(|config| {
            let trades = by_model
                .get(config.model_pattern.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let outcome = ForecastPipeline::new(config).run(trades);
            let path = default_output_path(&request.output_dir, &config.model_pattern);
            let written = write_trajectory_json(&path, &outcome).map(|_| outcome.summary);
            pb.inc(1);
            written
        })
        .collect();
    pb.finish_with_message("done");

    let mut summaries = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(err) => warn!("Failed to write model forecast: {:#}", err),
        }
    }
    info!(
        "Wrote {} of {} model forecast(s) to {}",
        summaries.len(),
        models.len(),
        request.output_dir.display()
    );
    Ok(summaries)
}
