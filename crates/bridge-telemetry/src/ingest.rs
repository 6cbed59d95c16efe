use std::time::Instant;

use mavlink::common::{EstimatorStatusFlags, MavLandedState, MavMessage, MavModeFlag, MavState};
use mavlink::MavHeader;
use tracing::{debug, info};

use bridge_state::ConnectionMonitor;

use crate::snapshot::{ArmState, BlockReason, CommandAck, FlightPhase, TelemetrySnapshot};

/// Battery is OK strictly above this remaining percentage.
pub const BATTERY_OK_THRESHOLD_PCT: i8 = 20;

/// Applies decoded MAVLink messages to the telemetry snapshot.
///
/// One message, one deterministic mutation pass. Heartbeats carrying our own
/// ground-side system id are ignored so our beacon can never poison the
/// vehicle state.
pub struct TelemetryIngestor {
    own_system_id: u8,
}

impl TelemetryIngestor {
    pub fn new(own_system_id: u8) -> Self {
        Self { own_system_id }
    }

    pub fn handle_message(
        &self,
        header: &MavHeader,
        msg: &MavMessage,
        snapshot: &mut TelemetrySnapshot,
        monitor: &mut ConnectionMonitor,
        now: Instant,
    ) {
        // Any decoded message counts as link activity, whatever its kind.
        snapshot.last_link_rx_time = Some(now);

        match msg {
            MavMessage::HEARTBEAT(hb) => {
                if header.system_id == self.own_system_id {
                    return;
                }
                if !snapshot.heartbeat_received {
                    info!("vehicle detected (sysid {})", header.system_id);
                }
                snapshot.system_id = header.system_id;
                snapshot.component_id = header.component_id;
                snapshot.heartbeat_received = true;
                snapshot.last_heartbeat_time = Some(now);

                snapshot.arm_state = if hb
                    .base_mode
                    .contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED)
                {
                    ArmState::Armed
                } else {
                    ArmState::Disarmed
                };

                snapshot.in_failsafe = matches!(
                    hb.system_status,
                    MavState::MAV_STATE_CRITICAL | MavState::MAV_STATE_EMERGENCY
                );
                if snapshot.in_failsafe {
                    snapshot.last_block_reason = Some(BlockReason::FailsafeActive);
                }

                monitor.note_heartbeat();
            }

            MavMessage::SYS_STATUS(sys) => {
                // -1 means the autopilot does not report capacity; treat as
                // OK rather than blocking every command.
                snapshot.battery_ok = sys.battery_remaining > BATTERY_OK_THRESHOLD_PCT
                    || sys.battery_remaining == -1;
                snapshot.battery_received = true;
                if !snapshot.battery_ok && !snapshot.in_failsafe {
                    snapshot.last_block_reason = Some(BlockReason::BatteryLow);
                }
            }

            MavMessage::ESTIMATOR_STATUS(est) => {
                let attitude_ok = est.flags.contains(EstimatorStatusFlags::ESTIMATOR_ATTITUDE);
                let velocity_ok = est
                    .flags
                    .contains(EstimatorStatusFlags::ESTIMATOR_VELOCITY_HORIZ);
                snapshot.ekf_ok = attitude_ok && velocity_ok;
                snapshot.ekf_received = true;
                if !snapshot.ekf_ok && !snapshot.in_failsafe {
                    snapshot.last_block_reason = Some(BlockReason::EkfNotReady);
                }
            }

            MavMessage::EXTENDED_SYS_STATE(ext) => {
                snapshot.flight_phase = match ext.landed_state {
                    MavLandedState::MAV_LANDED_STATE_ON_GROUND => FlightPhase::OnGround,
                    MavLandedState::MAV_LANDED_STATE_TAKEOFF => FlightPhase::TakingOff,
                    MavLandedState::MAV_LANDED_STATE_IN_AIR => FlightPhase::InAir,
                    MavLandedState::MAV_LANDED_STATE_LANDING => FlightPhase::Landing,
                    MavLandedState::MAV_LANDED_STATE_UNDEFINED => FlightPhase::Unknown,
                };
                snapshot.extended_state_received = true;
            }

            MavMessage::COMMAND_ACK(ack) => {
                let posted = snapshot.post_ack(CommandAck {
                    command: ack.command,
                    result: ack.result,
                });
                if posted {
                    debug!("ack cmd={:?} result={:?}", ack.command, ack.result);
                    snapshot.last_block_reason = None;
                } else {
                    // An unconsumed verdict is already pending; drop this one.
                    debug!("ack cmd={:?} dropped, mailbox occupied", ack.command);
                }
            }

            MavMessage::STATUSTEXT(st) => {
                let bytes: &[u8] = st.text.as_ref();
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let text = String::from_utf8_lossy(&bytes[..end]).into_owned();
                debug!("statustext sev={:?}: {}", st.severity, text);
                snapshot.last_status_text = Some(text);
            }

            _ => {}
        }
    }
}
