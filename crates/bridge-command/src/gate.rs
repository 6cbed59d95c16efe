//! Pure safety gating: which logical commands are currently allowed, and
//! why not. No mutation, no I/O.

use mavlink::common::MavCmd;

use bridge_state::ConnectionState;
use bridge_telemetry::{ArmState, BlockReason, TelemetrySnapshot};

use crate::VehicleCommand;

/// One row of the static command table.
pub struct CommandSpec {
    pub logical: VehicleCommand,
    pub wire_id: MavCmd,
    pub allowed: fn(&TelemetrySnapshot) -> Result<(), BlockReason>,
}

pub static COMMAND_TABLE: &[CommandSpec] = &[
    CommandSpec {
        logical: VehicleCommand::Arm,
        wire_id: MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
        allowed: can_arm,
    },
    CommandSpec {
        logical: VehicleCommand::Disarm,
        wire_id: MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
        allowed: can_disarm,
    },
    CommandSpec {
        logical: VehicleCommand::SetModeAuto,
        wire_id: MavCmd::MAV_CMD_DO_SET_MODE,
        allowed: can_set_auto,
    },
    CommandSpec {
        logical: VehicleCommand::Takeoff,
        wire_id: MavCmd::MAV_CMD_NAV_TAKEOFF,
        allowed: can_takeoff,
    },
    CommandSpec {
        logical: VehicleCommand::Land,
        wire_id: MavCmd::MAV_CMD_NAV_LAND,
        allowed: can_land,
    },
];

pub fn find_command(cmd: VehicleCommand) -> Option<&'static CommandSpec> {
    COMMAND_TABLE.iter().find(|spec| spec.logical == cmd)
}

/// Evaluate a logical command against the current snapshot.
///
/// Link failsafe overrides every table predicate. Within predicates the
/// reason order is fixed: failsafe, then EKF, then battery, then landed
/// state, then arm state.
pub fn evaluate(
    cmd: VehicleCommand,
    telemetry: &TelemetrySnapshot,
    connection: ConnectionState,
) -> Result<(), BlockReason> {
    if connection == ConnectionState::Failsafe {
        return Err(BlockReason::FailsafeActive);
    }
    match find_command(cmd) {
        Some(spec) => (spec.allowed)(telemetry),
        None => Err(BlockReason::UnknownCommand),
    }
}

fn can_arm(t: &TelemetrySnapshot) -> Result<(), BlockReason> {
    if t.in_failsafe {
        return Err(BlockReason::FailsafeActive);
    }
    if !t.heartbeat_received {
        return Err(BlockReason::NoHeartbeat);
    }
    if !t.ekf_ok {
        return Err(BlockReason::EkfNotReady);
    }
    if !t.battery_ok {
        return Err(BlockReason::BatteryLow);
    }
    if !t.is_landed() {
        return Err(BlockReason::NotLanded);
    }
    if t.arm_state != ArmState::Disarmed {
        return Err(BlockReason::AlreadyArmed);
    }
    Ok(())
}

fn can_disarm(t: &TelemetrySnapshot) -> Result<(), BlockReason> {
    if t.arm_state != ArmState::Armed {
        return Err(BlockReason::NotArmed);
    }
    if !t.is_landed() {
        return Err(BlockReason::NotLanded);
    }
    Ok(())
}

fn can_set_auto(t: &TelemetrySnapshot) -> Result<(), BlockReason> {
    if t.in_failsafe {
        return Err(BlockReason::FailsafeActive);
    }
    if t.arm_state != ArmState::Armed {
        return Err(BlockReason::NotArmed);
    }
    Ok(())
}

fn can_takeoff(t: &TelemetrySnapshot) -> Result<(), BlockReason> {
    if t.in_failsafe {
        return Err(BlockReason::FailsafeActive);
    }
    if !t.ekf_ok {
        return Err(BlockReason::EkfNotReady);
    }
    if !t.is_landed() {
        return Err(BlockReason::NotLanded);
    }
    if t.arm_state != ArmState::Armed {
        return Err(BlockReason::NotArmed);
    }
    Ok(())
}

fn can_land(t: &TelemetrySnapshot) -> Result<(), BlockReason> {
    if !t.is_airborne() {
        return Err(BlockReason::NotAirborne);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_telemetry::FlightPhase;

    /// Healthy, landed, disarmed vehicle. The baseline everything-allowed
    /// state for ARM.
    fn ready() -> TelemetrySnapshot {
        let mut t = TelemetrySnapshot::new();
        t.heartbeat_received = true;
        t.ekf_ok = true;
        t.ekf_received = true;
        t.battery_ok = true;
        t.battery_received = true;
        t.extended_state_received = true;
        t.flight_phase = FlightPhase::OnGround;
        t
    }

    #[test]
    fn arm_allowed_only_when_all_preconditions_hold() {
        let t = ready();
        assert_eq!(evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected), Ok(()));

        // each precondition alone blocks
        let mut t = ready();
        t.heartbeat_received = false;
        assert!(evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected).is_err());

        let mut t = ready();
        t.ekf_ok = false;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::EkfNotReady)
        );

        let mut t = ready();
        t.battery_ok = false;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::BatteryLow)
        );

        let mut t = ready();
        t.flight_phase = FlightPhase::InAir;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::NotLanded)
        );

        let mut t = ready();
        t.arm_state = ArmState::Armed;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::AlreadyArmed)
        );

        let mut t = ready();
        t.in_failsafe = true;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::FailsafeActive)
        );
    }

    #[test]
    fn link_failsafe_denies_everything() {
        let mut t = ready();
        t.arm_state = ArmState::Armed;
        t.flight_phase = FlightPhase::InAir;
        for cmd in [
            VehicleCommand::Arm,
            VehicleCommand::Disarm,
            VehicleCommand::SetModeAuto,
            VehicleCommand::Takeoff,
            VehicleCommand::Land,
        ] {
            assert_eq!(
                evaluate(cmd, &t, ConnectionState::Failsafe),
                Err(BlockReason::FailsafeActive),
                "{:?} must be denied in failsafe",
                cmd
            );
        }
    }

    #[test]
    fn reason_precedence_is_total_and_deterministic() {
        // everything wrong at once: failsafe wins
        let mut t = ready();
        t.in_failsafe = true;
        t.ekf_ok = false;
        t.battery_ok = false;
        t.flight_phase = FlightPhase::InAir;
        t.arm_state = ArmState::Armed;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::FailsafeActive)
        );

        t.in_failsafe = false;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::EkfNotReady)
        );

        t.ekf_ok = true;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::BatteryLow)
        );

        t.battery_ok = true;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::NotLanded)
        );

        t.flight_phase = FlightPhase::OnGround;
        assert_eq!(
            evaluate(VehicleCommand::Arm, &t, ConnectionState::Connected),
            Err(BlockReason::AlreadyArmed)
        );
    }

    #[test]
    fn disarm_needs_armed_and_landed() {
        let mut t = ready();
        assert_eq!(
            evaluate(VehicleCommand::Disarm, &t, ConnectionState::Connected),
            Err(BlockReason::NotArmed)
        );

        t.arm_state = ArmState::Armed;
        assert_eq!(evaluate(VehicleCommand::Disarm, &t, ConnectionState::Armed), Ok(()));

        t.flight_phase = FlightPhase::InAir;
        assert_eq!(
            evaluate(VehicleCommand::Disarm, &t, ConnectionState::Armed),
            Err(BlockReason::NotLanded)
        );
    }

    #[test]
    fn set_auto_needs_armed_and_no_failsafe() {
        let mut t = ready();
        t.arm_state = ArmState::Armed;
        assert_eq!(evaluate(VehicleCommand::SetModeAuto, &t, ConnectionState::Armed), Ok(()));

        t.in_failsafe = true;
        assert_eq!(
            evaluate(VehicleCommand::SetModeAuto, &t, ConnectionState::Armed),
            Err(BlockReason::FailsafeActive)
        );

        t.in_failsafe = false;
        t.arm_state = ArmState::Disarmed;
        assert_eq!(
            evaluate(VehicleCommand::SetModeAuto, &t, ConnectionState::Connected),
            Err(BlockReason::NotArmed)
        );
    }

    #[test]
    fn takeoff_needs_armed_landed_ekf() {
        let mut t = ready();
        t.arm_state = ArmState::Armed;
        assert_eq!(evaluate(VehicleCommand::Takeoff, &t, ConnectionState::Armed), Ok(()));

        t.ekf_ok = false;
        assert_eq!(
            evaluate(VehicleCommand::Takeoff, &t, ConnectionState::Armed),
            Err(BlockReason::EkfNotReady)
        );
    }

    #[test]
    fn land_needs_airborne() {
        let mut t = ready();
        assert_eq!(
            evaluate(VehicleCommand::Land, &t, ConnectionState::Connected),
            Err(BlockReason::NotAirborne)
        );
        t.flight_phase = FlightPhase::InAir;
        assert_eq!(evaluate(VehicleCommand::Land, &t, ConnectionState::Armed), Ok(()));
    }

    #[test]
    fn table_maps_each_logical_command_once() {
        for cmd in [
            VehicleCommand::Arm,
            VehicleCommand::Disarm,
            VehicleCommand::SetModeAuto,
            VehicleCommand::Takeoff,
            VehicleCommand::Land,
        ] {
            let hits = COMMAND_TABLE.iter().filter(|s| s.logical == cmd).count();
            assert_eq!(hits, 1, "{:?} must appear exactly once", cmd);
        }
        assert_eq!(
            find_command(VehicleCommand::Takeoff).unwrap().wire_id,
            MavCmd::MAV_CMD_NAV_TAKEOFF
        );
    }
}
