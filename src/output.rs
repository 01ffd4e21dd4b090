//! Output formatting and persistence for cycle results.
//!
//! Supports pretty-printing, JSON serialization, CSV append and a textual
//! forecast summary.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::cycle::CycleOutcome;
use crate::scheduler::{ChargeAction, ForecastSeries, GridOutlook};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One row of the decision log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub vehicle: String,
    pub battery_level_pct: Option<u8>,
    pub charge_limit_pct: Option<u8>,
    pub charge_current_amps: Option<u32>,
    pub rule: Option<u8>,
    pub action: Option<ChargeAction>,
    pub target_current: Option<u32>,
    pub target_limit_pct: Option<u8>,
    pub target_departure_minutes: Option<u32>,
    pub target_off_peak_end_minutes: Option<u32>,
    pub load_mean: Option<f64>,
    pub load_std_dev: Option<f64>,
    pub current_load: Option<f64>,
    pub charge_limit_factor: Option<f64>,
    pub command_failures: usize,
    pub error: Option<String>,
}

impl DecisionRecord {
    /// A row for a cycle that failed before a plan was made.
    pub fn from_error(timestamp: DateTime<Utc>, error: &anyhow::Error) -> Self {
        Self {
            timestamp,
            error: Some(format!("{error:#}")),
            ..Default::default()
        }
    }
}

impl From<&CycleOutcome> for DecisionRecord {
    fn from(outcome: &CycleOutcome) -> Self {
        let charge = &outcome.snapshot.charge;
        let plan = &outcome.plan;
        Self {
            timestamp: outcome.at,
            vehicle: outcome.snapshot.display_name.clone(),
            battery_level_pct: Some(charge.battery_level_pct),
            charge_limit_pct: Some(charge.charge_limit_pct),
            charge_current_amps: Some(charge.charge_current_amps),
            rule: Some(plan.rule.priority()),
            action: Some(plan.action),
            target_current: plan.target_current,
            target_limit_pct: plan.target_limit_pct,
            target_departure_minutes: plan.target_departure_minutes_of_day,
            target_off_peak_end_minutes: plan.target_off_peak_end_minutes_of_day,
            load_mean: Some(outcome.stats.mean),
            load_std_dev: Some(outcome.stats.std_dev),
            current_load: Some(outcome.stats.current_load),
            charge_limit_factor: Some(outcome.stats.charge_limit_factor()),
            command_failures: outcome.command_failures,
            error: None,
        }
    }
}

/// Logs a decision record using Rust's debug pretty-print format.
pub fn print_pretty(record: &DecisionRecord) {
    debug!("{:#?}", record);
}

/// Logs a decision record as pretty-printed JSON.
pub fn print_json(record: &DecisionRecord) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

/// Appends a [`DecisionRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, record: &DecisionRecord) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Human readable digest of the forecast as seen at `now`.
pub fn forecast_summary(series: &ForecastSeries, now: DateTime<Utc>, timezone: Tz) -> String {
    let outlook = GridOutlook::analyze(series, now);
    let stats = outlook.stats;
    let local = |t: DateTime<Utc>| t.with_timezone(&timezone).format("%a %H:%M").to_string();

    let off_peak = match outlook.off_peak_end {
        Some(end) => format!("off-peak ends {}", local(end)),
        None => "no off-peak window ahead".to_string(),
    };

    format!(
        "{} points {} to {}; mean {:.0}, band {:.0}..{:.0}; now {:.0} (factor {:.2}); {}",
        series.len(),
        local(series.first().timestamp),
        local(series.last().timestamp),
        stats.mean,
        stats.lower_band,
        stats.upper_band,
        stats.current_load,
        stats.charge_limit_factor(),
        off_peak
    )
}
