//! One polling cycle: read everything, decide once, apply, settle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::executor::apply_plan;
use crate::scheduler::travel::estimate_travel;
use crate::scheduler::{
    ChargeActionPlan, ChargeDecisionEngine, DecisionRule, LoadStatistics, TravelEstimate,
    select_rule,
};
use crate::services::calendar_api::CalendarApi;
use crate::services::directions_api::DirectionsApi;
use crate::services::forecast_api::ForecastApi;
use crate::services::vehicle_api::{VehicleApi, VehicleSnapshot};

/// The external services a cycle talks to.
pub struct Providers<'a> {
    pub forecast: &'a dyn ForecastApi,
    pub calendar: &'a dyn CalendarApi,
    pub directions: &'a dyn DirectionsApi,
    pub vehicle: &'a dyn VehicleApi,
}

/// What a successful cycle saw and did.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub at: DateTime<Utc>,
    pub snapshot: VehicleSnapshot,
    pub stats: LoadStatistics,
    pub travel: TravelEstimate,
    pub plan: ChargeActionPlan,
    pub command_failures: usize,
}

/// Runs one decision pass at `now` and applies the resulting plan.
///
/// Calendar and directions are only consulted when the vehicle is in the
/// optimize branch. After a mutating plan the cycle waits
/// `config.settle_delay` so the next read sees the new vehicle state.
#[tracing::instrument(skip_all, fields(%now))]
pub async fn run_cycle(
    providers: &Providers<'_>,
    config: &Config,
    engine: &ChargeDecisionEngine,
    now: DateTime<Utc>,
) -> Result<CycleOutcome> {
    let forecast = providers
        .forecast
        .load_forecast(now - config.forecast_lag, now + config.forecast_lead)
        .await
        .context("Failed to load grid forecast")?;
    let stats = LoadStatistics::from_series(&forecast, now);
    debug!(
        mean = stats.mean,
        lower = stats.lower_band,
        upper = stats.upper_band,
        current = stats.current_load,
        "Grid load statistics"
    );

    let snapshot = providers
        .vehicle
        .snapshot()
        .await
        .context("Failed to read vehicle state")?;
    info!("{}", snapshot.summary(now));

    let travel = if select_rule(&snapshot.charge, now) == DecisionRule::Optimize {
        let events = providers
            .calendar
            .upcoming_events(config.calendar_hours, config.calendar_max_results)
            .await
            .context("Failed to read calendar")?;
        let estimate = estimate_travel(&events, config.home_address()?, providers.directions).await;
        debug!(
            relevant = estimate.relevant_events.len(),
            farthest_miles = estimate.farthest_distance_miles(),
            "Travel estimate"
        );
        estimate
    } else {
        TravelEstimate::default()
    };

    let plan = engine.decide(&snapshot.charge, &forecast, &travel, now)?;
    info!(
        rule = plan.rule.priority(),
        action = ?plan.action,
        "{} {}",
        snapshot.display_name,
        plan.rule.describe()
    );

    let command_failures = apply_plan(providers.vehicle, &snapshot, &plan).await;

    if plan.action.is_mutating() && !config.settle_delay.is_zero() {
        debug!(delay_secs = config.settle_delay.as_secs(), "Waiting for vehicle to settle");
        tokio::time::sleep(config.settle_delay).await;
    }

    Ok(CycleOutcome {
        at: now,
        snapshot,
        stats,
        travel,
        plan,
        command_failures,
    })
}
