//! Applies a [`ChargeActionPlan`] to a vehicle.
//!
//! Commands are sent in order and never retried within a cycle. A failed
//! command is logged and the rest of the plan is still attempted; the next
//! cycle re-reads the vehicle and decides again.

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::scheduler::{ChargeAction, ChargeActionPlan};
use crate::services::vehicle_api::{ScheduleCommand, VehicleApi, VehicleSnapshot};

/// Builds the scheduled-departure command, echoing back the vehicle's own
/// preconditioning and off-peak preferences.
pub fn schedule_command(
    snapshot: &VehicleSnapshot,
    departure_minutes: u32,
    end_off_peak_minutes: u32,
) -> ScheduleCommand {
    ScheduleCommand {
        enable: snapshot.charge.off_peak_charging_enabled,
        departure_minutes,
        preconditioning_enabled: snapshot.schedule.preconditioning_enabled,
        preconditioning_weekdays_only: snapshot.schedule.preconditioning_weekdays_only,
        off_peak_charging_enabled: snapshot.charge.off_peak_charging_enabled,
        off_peak_weekdays_only: snapshot.schedule.off_peak_weekdays_only,
        end_off_peak_minutes,
    }
}

/// Sends the commands for `plan` and returns how many of them failed.
pub async fn apply_plan(
    vehicle: &dyn VehicleApi,
    snapshot: &VehicleSnapshot,
    plan: &ChargeActionPlan,
) -> usize {
    if !plan.action.is_mutating() {
        return 0;
    }

    let mut failures = 0;
    let mut record = |step: &str, result: Result<()>| {
        if let Err(e) = result {
            warn!(step, error = %e, "Vehicle command failed");
            failures += 1;
        }
    };

    record("wake_up", vehicle.wake_up().await);

    match plan.action {
        ChargeAction::NoOp => {}
        ChargeAction::StartCharge => {
            record("set_charge_current", set_current(vehicle, plan).await);
            record("start_charging", vehicle.start_charging().await);
        }
        ChargeAction::StopCharge => {
            record("stop_charging", vehicle.stop_charging().await);
        }
        ChargeAction::SetCurrentOnly => {
            record("set_charge_current", set_current(vehicle, plan).await);
        }
        ChargeAction::FullOptimize => {
            record("set_charge_current", set_current(vehicle, plan).await);
            let limit = match plan.target_limit_pct {
                Some(pct) => vehicle.set_charge_limit(pct).await,
                None => Err(anyhow!("plan has no target charge limit")),
            };
            record("set_charge_limit", limit);
            let schedule = match (
                plan.target_departure_minutes_of_day,
                plan.target_off_peak_end_minutes_of_day,
            ) {
                (Some(departure), Some(end_off_peak)) => {
                    let command = schedule_command(snapshot, departure, end_off_peak);
                    vehicle.set_schedule(&command).await
                }
                _ => Err(anyhow!("plan has no departure schedule")),
            };
            record("set_schedule", schedule);
        }
    }

    if failures == 0 {
        info!(action = ?plan.action, "Plan applied");
    }
    failures
}

async fn set_current(vehicle: &dyn VehicleApi, plan: &ChargeActionPlan) -> Result<()> {
    match plan.target_current {
        Some(amps) => vehicle.set_charge_current(amps).await,
        None => Err(anyhow!("plan has no target current")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ChargingState, DecisionRule, ScheduledChargingMode, VehicleChargeState};
    use crate::services::vehicle_api::SchedulePreferences;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingVehicle {
        calls: Mutex<Vec<String>>,
        failing: Option<&'static str>,
    }

    impl RecordingVehicle {
        fn log(&self, call: String) -> Result<()> {
            let failed = self.failing.is_some_and(|f| call.starts_with(f));
            self.calls.lock().unwrap().push(call);
            if failed {
                bail!("simulated failure");
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VehicleApi for RecordingVehicle {
        async fn snapshot(&self) -> Result<VehicleSnapshot> {
            Ok(snapshot())
        }
        async fn wake_up(&self) -> Result<()> {
            self.log("wake_up".to_string())
        }
        async fn set_charge_current(&self, amps: u32) -> Result<()> {
            self.log(format!("current {amps}"))
        }
        async fn set_charge_limit(&self, percent: u8) -> Result<()> {
            self.log(format!("limit {percent}"))
        }
        async fn start_charging(&self) -> Result<()> {
            self.log("start".to_string())
        }
        async fn stop_charging(&self) -> Result<()> {
            self.log("stop".to_string())
        }
        async fn set_schedule(&self, command: &ScheduleCommand) -> Result<()> {
            self.log(format!(
                "schedule {} {} {}",
                command.enable, command.departure_minutes, command.end_off_peak_minutes
            ))
        }
    }

    #[tokio::test]
    async fn test_no_op_sends_nothing() {
        let vehicle = RecordingVehicle::default();
        let plan = ChargeActionPlan::no_op(DecisionRule::NotPluggedIn);
        assert_eq!(apply_plan(&vehicle, &snapshot(), &plan).await, 0);
        assert!(vehicle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_charge_sequence() {
        let vehicle = RecordingVehicle::default();
        let plan = ChargeActionPlan::with_action(DecisionRule::LowBatteryStart, ChargeAction::StartCharge)
            .with_current(32);
        assert_eq!(apply_plan(&vehicle, &snapshot(), &plan).await, 0);
        assert_eq!(vehicle.calls(), vec!["wake_up", "current 32", "start"]);
    }

    #[tokio::test]
    async fn test_stop_charge_sequence() {
        let vehicle = RecordingVehicle::default();
        let plan = ChargeActionPlan::with_action(DecisionRule::PrematureStart, ChargeAction::StopCharge);
        apply_plan(&vehicle, &snapshot(), &plan).await;
        assert_eq!(vehicle.calls(), vec!["wake_up", "stop"]);
    }

    #[tokio::test]
    async fn test_full_optimize_sequence() {
        let vehicle = RecordingVehicle::default();
        let plan = optimize_plan();
        assert_eq!(apply_plan(&vehicle, &snapshot(), &plan).await, 0);
        assert_eq!(
            vehicle.calls(),
            vec!["wake_up", "current 16", "limit 80", "schedule true 420 300"]
        );
    }

    #[tokio::test]
    async fn test_failed_command_does_not_stop_the_plan() {
        let vehicle = RecordingVehicle {
            failing: Some("limit"),
            ..Default::default()
        };
        let plan = optimize_plan();
        assert_eq!(apply_plan(&vehicle, &snapshot(), &plan).await, 1);
        assert_eq!(vehicle.calls().len(), 4);
    }

    #[test]
    fn test_schedule_command_echoes_preferences() {
        let mut snapshot = snapshot();
        snapshot.schedule.preconditioning_enabled = true;
        snapshot.schedule.off_peak_weekdays_only = true;

        let command = schedule_command(&snapshot, 420, 300);
        assert!(command.enable);
        assert!(command.preconditioning_enabled);
        assert!(!command.preconditioning_weekdays_only);
        assert!(command.off_peak_weekdays_only);
        assert_eq!(command.departure_minutes, 420);
        assert_eq!(command.end_off_peak_minutes, 300);
    }

    // Helper functions for tests
    fn optimize_plan() -> ChargeActionPlan {
        ChargeActionPlan {
            rule: DecisionRule::Optimize,
            action: ChargeAction::FullOptimize,
            target_current: Some(16),
            target_limit_pct: Some(80),
            target_departure_minutes_of_day: Some(420),
            target_off_peak_end_minutes_of_day: Some(300),
        }
    }

    fn snapshot() -> VehicleSnapshot {
        VehicleSnapshot {
            id: "1".to_string(),
            display_name: "Blue".to_string(),
            online_state: "online".to_string(),
            last_seen: None,
            charge: VehicleChargeState {
                plugged_in: true,
                fast_charging: false,
                charging_state: ChargingState::Stopped,
                battery_level_pct: 64,
                charge_limit_pct: 80,
                charge_current_amps: 16,
                charge_current_max_amps: 32,
                scheduled_charging_mode: ScheduledChargingMode::DepartBy,
                off_peak_charging_enabled: true,
                scheduled_departure_time: None,
                scheduled_charging_start_time: None,
                time_to_full_charge_hours: 0.0,
            },
            schedule: SchedulePreferences::default(),
        }
    }
}
