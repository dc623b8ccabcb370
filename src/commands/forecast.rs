use crate::config::ForecastOverrides;
use crate::context::{AppContext, LedgerSource};
use crate::export::{default_output_path, write_trajectory_json};
use crate::pipeline::{ForecastOutcome, ForecastPipeline};
use anyhow::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};

pub struct ForecastRequest {
    pub model_pattern: String,
    pub source: LedgerSource,
    pub output: Option<PathBuf>,
    pub persist: bool,
    pub overrides: ForecastOverrides,
}

pub async fn run(app: &AppContext, request: &ForecastRequest) -> Result<ForecastOutcome> {
    let config = app
        .forecast_config(&request.model_pattern, &request.overrides)
        .await?;
    info!(
        "Forecasting '{}' (scale {}, recent window {}, horizon {:.2} day(s))",
        config.model_pattern,
        config.scale_factor,
        config.recent_window,
        config.horizon_days()
    );

    let filtered = app.load_filtered_trades(&config, &request.source).await?;
    let outcome = ForecastPipeline::new(&config).run_filtered(&filtered);

    let output_path = request
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(Path::new("."), &config.model_pattern));
    write_trajectory_json(&output_path, &outcome)?;
    info!(
        "Wrote {} trajectory point(s) to {}",
        outcome.points.len(),
        output_path.display()
    );

    if request.persist {
        if !app.has_database() {
            warn!("--persist requested without DATABASE_URL; skipping database write");
        } else {
            let mut db = app.database().await?;
            let run_id = db
                .replace_model_forecast(&outcome.summary, &outcome.points)
                .await?;
            info!(
                "Stored forecast run {} for '{}'",
                run_id, outcome.summary.model_pattern
            );
        }
    }

    Ok(outcome)
}
