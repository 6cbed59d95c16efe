use std::time::{Duration, Instant};

use mavlink::common::{MavCmd, MavResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmState {
    #[default]
    Disarmed,
    Armed,
}

/// Vehicle flight phase as reported by EXTENDED_SYS_STATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightPhase {
    #[default]
    Unknown,
    OnGround,
    TakingOff,
    InAir,
    Landing,
}

/// Why a command attempt was (or would be) denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    FailsafeActive,
    NoHeartbeat,
    EkfNotReady,
    BatteryLow,
    NotLanded,
    AlreadyArmed,
    NotArmed,
    NotAirborne,
    UnknownCommand,
}

/// A vehicle COMMAND_ACK, correlated by wire command id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandAck {
    pub command: MavCmd,
    pub result: MavResult,
}

/// Last-known vehicle state, derived purely from decoded telemetry.
///
/// Written only by [`crate::TelemetryIngestor`]; read by the safety gate,
/// the connection monitor and the command manager. The ack mailbox is kept
/// private so consumption has to go through [`Self::take_matching_ack`].
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    /// Identity of the last non-self heartbeat sender.
    pub system_id: u8,
    pub component_id: u8,

    pub heartbeat_received: bool,
    pub last_heartbeat_time: Option<Instant>,
    /// Timestamp of *any* decoded message; broader liveness signal than
    /// heartbeat cadence alone.
    pub last_link_rx_time: Option<Instant>,

    // "received" and "ok" are distinct: a subsystem can report and still be
    // unhealthy.
    pub ekf_ok: bool,
    pub ekf_received: bool,
    pub battery_ok: bool,
    pub battery_received: bool,

    pub arm_state: ArmState,
    pub flight_phase: FlightPhase,
    /// Gates trust in `flight_phase`.
    pub extended_state_received: bool,

    /// Vehicle-reported critical/emergency condition, independent of the
    /// link-timeout failsafe.
    pub in_failsafe: bool,

    last_command_ack: Option<CommandAck>,

    /// Last diagnostic reason a command attempt was denied. Informational.
    pub last_block_reason: Option<BlockReason>,
    /// Last STATUSTEXT from the vehicle, truncated to the wire field.
    pub last_status_text: Option<String>,
}

impl TelemetrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_telemetry_ready(&self) -> bool {
        self.heartbeat_received
            && self.ekf_received
            && self.battery_received
            && self.extended_state_received
    }

    pub fn is_landed(&self) -> bool {
        self.flight_phase == FlightPhase::OnGround
    }

    pub fn is_airborne(&self) -> bool {
        self.flight_phase == FlightPhase::InAir
    }

    pub fn heartbeat_age(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat_time.map(|t| now.duration_since(t))
    }

    pub fn link_age(&self, now: Instant) -> Option<Duration> {
        self.last_link_rx_time.map(|t| now.duration_since(t))
    }

    /// Deposit a fresh ack. Returns false (and drops the ack) if the mailbox
    /// already holds an unconsumed one; a pending verdict is never
    /// overwritten.
    pub fn post_ack(&mut self, ack: CommandAck) -> bool {
        if self.last_command_ack.is_some() {
            return false;
        }
        self.last_command_ack = Some(ack);
        true
    }

    pub fn ack_pending(&self) -> bool {
        self.last_command_ack.is_some()
    }

    /// Consume the pending ack iff its command id matches `wire_id`.
    ///
    /// A mismatched ack stays in the mailbox for a future owner.
    pub fn take_matching_ack(&mut self, wire_id: MavCmd) -> Option<CommandAck> {
        match self.last_command_ack {
            Some(ack) if ack.command == wire_id => self.last_command_ack.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(command: MavCmd) -> CommandAck {
        CommandAck {
            command,
            result: MavResult::MAV_RESULT_ACCEPTED,
        }
    }

    #[test]
    fn mailbox_never_overwrites_pending_ack() {
        let mut t = TelemetrySnapshot::new();
        assert!(t.post_ack(ack(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM)));
        assert!(!t.post_ack(ack(MavCmd::MAV_CMD_NAV_LAND)));

        let got = t
            .take_matching_ack(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM)
            .unwrap();
        assert_eq!(got.command, MavCmd::MAV_CMD_COMPONENT_ARM_DISARM);
    }

    #[test]
    fn mismatched_take_leaves_mailbox_intact() {
        let mut t = TelemetrySnapshot::new();
        t.post_ack(ack(MavCmd::MAV_CMD_NAV_TAKEOFF));

        assert!(t.take_matching_ack(MavCmd::MAV_CMD_NAV_LAND).is_none());
        assert!(t.ack_pending());
        assert!(t.take_matching_ack(MavCmd::MAV_CMD_NAV_TAKEOFF).is_some());
        assert!(!t.ack_pending());
    }

    #[test]
    fn readiness_requires_all_subsystems() {
        let mut t = TelemetrySnapshot::new();
        assert!(!t.is_telemetry_ready());
        t.heartbeat_received = true;
        t.ekf_received = true;
        t.battery_received = true;
        assert!(!t.is_telemetry_ready());
        t.extended_state_received = true;
        assert!(t.is_telemetry_ready());
    }

    #[test]
    fn flight_phase_predicates() {
        let mut t = TelemetrySnapshot::new();
        assert!(!t.is_landed());
        assert!(!t.is_airborne());
        t.flight_phase = FlightPhase::OnGround;
        assert!(t.is_landed());
        t.flight_phase = FlightPhase::InAir;
        assert!(t.is_airborne());
        assert!(!t.is_landed());
    }
}
