use crate::ledger::LedgerQuery;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;

pub const DEFAULT_SCALE_FACTOR: f64 = 10.0;
pub const DEFAULT_RECENT_WINDOW: usize = 300;
pub const DEFAULT_HORIZON_DAYS: f64 = 3.0;
pub const DEFAULT_PERCENTILES: [f64; 6] = [0.01, 0.05, 0.25, 0.75, 0.95, 0.99];
pub const DEFAULT_FORECAST_CATEGORY: &str = "predict";
pub const DEFAULT_EXCLUDED_CATEGORIES: [&str; 2] = ["manual", "error"];
pub const DEFAULT_MAX_FORECAST_STEPS: usize = 500;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Everything one pipeline run needs besides the ledger itself.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    // Ledger selection
    pub model_pattern: String,
    pub since: Option<DateTime<Utc>>,
    pub excluded_categories: Vec<String>,

    // Statistics
    pub scale_factor: f64,
    pub recent_window: usize,
    /// Fractions in (0, 1), ascending.
    pub percentiles: Vec<f64>,

    // Projection
    pub horizon: Duration,
    pub max_forecast_steps: usize,
    pub forecast_category: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model_pattern: String::new(),
            since: None,
            excluded_categories: DEFAULT_EXCLUDED_CATEGORIES
                .iter()
                .map(|value| value.to_string())
                .collect(),
            scale_factor: DEFAULT_SCALE_FACTOR,
            recent_window: DEFAULT_RECENT_WINDOW,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            horizon: horizon_from_days(DEFAULT_HORIZON_DAYS),
            max_forecast_steps: DEFAULT_MAX_FORECAST_STEPS,
            forecast_category: DEFAULT_FORECAST_CATEGORY.to_string(),
        }
    }
}

/// CLI-level overrides applied on top of stored settings.
#[derive(Debug, Clone, Default)]
pub struct ForecastOverrides {
    pub since: Option<NaiveDate>,
    pub scale_factor: Option<f64>,
    pub recent_window: Option<usize>,
    pub horizon_days: Option<f64>,
}

impl ForecastConfig {
    pub fn for_model<S: Into<String>>(model_pattern: S) -> Self {
        Self {
            model_pattern: model_pattern.into(),
            ..Self::default()
        }
    }

    /// Builds a config from the `settings` table, falling back to defaults for absent keys.
    pub fn from_settings_map(
        model_pattern: &str,
        settings: &HashMap<String, String>,
    ) -> Result<Self> {
        let defaults = Self::for_model(model_pattern);

        let scale_factor =
            optional_setting_f64(settings, "FORECAST_SCALE_FACTOR", Some(0.0), None)?
                .unwrap_or(defaults.scale_factor);
        let recent_window = optional_setting_usize(settings, "FORECAST_RECENT_WINDOW", 1)?
            .unwrap_or(defaults.recent_window);
        let horizon = optional_setting_f64(settings, "FORECAST_HORIZON_DAYS", Some(0.0), None)?
            .map(horizon_from_days)
            .unwrap_or(defaults.horizon);
        let percentiles = optional_setting_f64_list(settings, "FORECAST_PERCENTILES")?
            .map(|values| values.into_iter().map(|value| value / 100.0).collect())
            .unwrap_or(defaults.percentiles);
        let excluded_categories = optional_setting(settings, "FORECAST_EXCLUDED_CATEGORIES")
            .map(parse_category_list)
            .unwrap_or(defaults.excluded_categories);
        let forecast_category = optional_setting(settings, "FORECAST_CATEGORY")
            .map(|value| value.to_string())
            .unwrap_or(defaults.forecast_category);
        let max_forecast_steps = optional_setting_usize(settings, "FORECAST_MAX_STEPS", 1)?
            .unwrap_or(defaults.max_forecast_steps);

        let config = Self {
            model_pattern: model_pattern.to_string(),
            since: None,
            excluded_categories,
            scale_factor,
            recent_window,
            percentiles: normalize_percentiles(percentiles),
            horizon,
            max_forecast_steps,
            forecast_category,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(mut self, overrides: &ForecastOverrides) -> Result<Self> {
        if let Some(since) = overrides.since {
            self.since = Some(since.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
        }
        if let Some(scale_factor) = overrides.scale_factor {
            self.scale_factor = scale_factor;
        }
        if let Some(recent_window) = overrides.recent_window {
            self.recent_window = recent_window;
        }
        if let Some(days) = overrides.horizon_days {
            self.horizon = horizon_from_days(days);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(anyhow!(
                "Scale factor must be a positive number (value: {})",
                self.scale_factor
            ));
        }
        if self.recent_window == 0 {
            return Err(anyhow!("Recent window must contain at least one trade"));
        }
        if self.horizon <= Duration::zero() {
            return Err(anyhow!(
                "Forecast horizon must be positive (value: {}s)",
                self.horizon.num_seconds()
            ));
        }
        if self.horizon.num_nanoseconds().is_none() {
            return Err(anyhow!(
                "Forecast horizon is too long (value: {} days)",
                self.horizon_days()
            ));
        }
        if self.max_forecast_steps == 0 {
            return Err(anyhow!("Max forecast steps must be at least 1"));
        }
        if self.forecast_category.trim().is_empty() {
            return Err(anyhow!("Forecast category must not be empty"));
        }
        if let Some(bad) = self
            .percentiles
            .iter()
            .find(|value| !value.is_finite() || **value <= 0.0 || **value >= 1.0)
        {
            return Err(anyhow!(
                "Percentiles must lie strictly between 0 and 100 (value: {})",
                bad * 100.0
            ));
        }
        Ok(())
    }

    pub fn ledger_query(&self) -> LedgerQuery {
        LedgerQuery {
            model_pattern: self.model_pattern.clone(),
            since: self.since,
            excluded_categories: self.excluded_categories.clone(),
            forecast_category: self.forecast_category.clone(),
        }
    }

    pub fn horizon_days(&self) -> f64 {
        self.horizon.num_milliseconds() as f64 / MILLIS_PER_DAY
    }
}

pub fn horizon_from_days(days: f64) -> Duration {
    let millis = (days * MILLIS_PER_DAY).round() as i64;
    Duration::milliseconds(millis.max(-i64::MAX))
}

fn normalize_percentiles(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    values
}

fn parse_category_list(raw: &str) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for part in raw
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|part| part.trim().trim_matches('"').to_ascii_lowercase())
    {
        if !part.is_empty() && !categories.contains(&part) {
            categories.push(part);
        }
    }
    categories
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn optional_setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    min_exclusive: Option<f64>,
    max: Option<f64>,
) -> Result<Option<f64>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if let Some(min_value) = min_exclusive {
        if value <= min_value {
            return Err(anyhow!(
                "Setting {} must be > {} (value: {})",
                key,
                min_value,
                raw
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(Some(value))
}

fn optional_setting_usize(
    settings: &HashMap<String, String>,
    key: &str,
    min: usize,
) -> Result<Option<usize>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if value.fract() != 0.0 {
        return Err(anyhow!(
            "Setting {} must be an integer (value: {})",
            key,
            raw
        ));
    }
    if value < min as f64 {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    Ok(Some(value as usize))
}

fn optional_setting_f64_list(
    settings: &HashMap<String, String>,
    key: &str,
) -> Result<Option<Vec<f64>>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let trimmed = raw.trim_matches(|c| c == '[' || c == ']');
    let mut values = Vec::new();

    for part in trimmed.split(|c: char| c == ',' || c.is_whitespace()) {
        let entry = part.trim();
        if entry.is_empty() {
            continue;
        }
        let value = entry
            .parse::<f64>()
            .map_err(|_| anyhow!("Setting {} must be a list of numbers (value: {})", key, raw))?;
        if !value.is_finite() {
            return Err(anyhow!(
                "Setting {} must contain only finite numbers (value: {})",
                key,
                raw
            ));
        }
        values.push(value);
    }

    if values.is_empty() {
        return Err(anyhow!(
            "Setting {} must contain at least one number (value: {})",
            key,
            raw
        ));
    }

    Ok(Some(values))
}
