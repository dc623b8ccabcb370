use crate::models::TrajectoryPoint;
use crate::pipeline::{ForecastOutcome, ForecastSummary};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrajectoryDocument<'a> {
    summary: &'a ForecastSummary,
    points: &'a [TrajectoryPoint],
}

/// Read side of the trajectory JSON, for consumers and tests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryFile {
    pub summary: serde_json::Value,
    pub points: Vec<TrajectoryPoint>,
}

pub fn write_trajectory_json(path: &Path, outcome: &ForecastOutcome) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create trajectory file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let document = TrajectoryDocument {
        summary: &outcome.summary,
        points: &outcome.points,
    };
    serde_json::to_writer_pretty(&mut writer, &document)
        .with_context(|| format!("Failed to write trajectory JSON {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush trajectory JSON {}", path.display()))?;
    Ok(())
}

pub fn read_trajectory_json(path: &Path) -> Result<TrajectoryFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trajectory file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse trajectory JSON {}", path.display()))
}

/// `forecast-<model>.json` with anything outside `[A-Za-z0-9_-]` replaced by `_`.
pub fn default_output_path(dir: &Path, model_pattern: &str) -> PathBuf {
    let sanitized: String = model_pattern
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if sanitized.is_empty() {
        "all".to_string()
    } else {
        sanitized
    };
    dir.join(format!("forecast-{}.json", stem))
}
