//! Single-in-flight command lifecycle: send, await ack, retry, abandon.

use std::time::{Duration, Instant};

use mavlink::common::{MavCmd, MavMode, MavResult};
use tracing::{info, warn};

use bridge_state::{ConnectionMonitor, ConnectionState};
use bridge_telemetry::TelemetrySnapshot;

use crate::{gate, CommandSender, VehicleCommand};

/// How long to wait for a COMMAND_ACK before retransmitting.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(3000);

/// Retransmissions after the initial send.
pub const MAX_RETRIES: u32 = 3;

pub const DEFAULT_TAKEOFF_ALTITUDE_M: f32 = 2.5;

#[derive(Debug)]
struct TrackedCommand {
    logical: VehicleCommand,
    wire_id: MavCmd,
    /// The exact COMMAND_LONG parameter envelope; retransmissions resend it
    /// unchanged.
    params: [f32; 7],
    retry_count: u32,
    max_retries: u32,
    last_sent_time: Instant,
}

/// Drives accepted commands through their acknowledge-or-retry lifecycle.
///
/// At most one command is ever in flight; a request made while one is
/// active is rejected outright, never queued. There is no cancel operation:
/// an in-flight command ends only on a matching ack or retry exhaustion.
pub struct CommandManager {
    sender: Option<Box<dyn CommandSender>>,
    active: Option<TrackedCommand>,
    takeoff_altitude_m: f32,
}

impl CommandManager {
    pub fn new(takeoff_altitude_m: f32) -> Self {
        Self {
            sender: None,
            active: None,
            takeoff_altitude_m,
        }
    }

    /// Bind the outbound command link. Done once at startup; requests made
    /// before this are rejected.
    pub fn bind_sender(&mut self, sender: Box<dyn CommandSender>) {
        self.sender = Some(sender);
    }

    pub fn has_active_command(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_command(&self) -> Option<VehicleCommand> {
        self.active.as_ref().map(|a| a.logical)
    }

    /// Gate and, if allowed, transmit `cmd`. Returns whether the request was
    /// accepted; a denial leaves its reason in `snapshot.last_block_reason`.
    pub fn request(
        &mut self,
        cmd: VehicleCommand,
        snapshot: &mut TelemetrySnapshot,
        monitor: &ConnectionMonitor,
        now: Instant,
    ) -> bool {
        if let Some(active) = &self.active {
            warn!("{:?} refused: {:?} still in flight", cmd, active.logical);
            return false;
        }
        let Some(sender) = self.sender.as_mut() else {
            warn!("{:?} refused: no command link bound", cmd);
            return false;
        };
        let Some(spec) = gate::find_command(cmd) else {
            warn!("{:?} refused: not in command table", cmd);
            return false;
        };
        if let Err(reason) = gate::evaluate(cmd, snapshot, monitor.state()) {
            snapshot.last_block_reason = Some(reason);
            warn!("{:?} blocked: {:?}", cmd, reason);
            return false;
        }

        let params = wire_params(cmd, self.takeoff_altitude_m);
        if let Err(e) = sender.send_command(spec.wire_id, params) {
            // Non-fatal: the retry path gets another chance.
            warn!("{:?} send failed: {:#}", cmd, e);
        }
        info!("{:?} sent as {:?}", cmd, spec.wire_id);

        self.active = Some(TrackedCommand {
            logical: cmd,
            wire_id: spec.wire_id,
            params,
            retry_count: 0,
            max_retries: MAX_RETRIES,
            last_sent_time: now,
        });
        true
    }

    /// Per-tick lifecycle step: ack resolution first, then retry/timeout.
    /// An ack that has already arrived is honored even when the retry timer
    /// expired in the same tick.
    pub fn update(
        &mut self,
        snapshot: &mut TelemetrySnapshot,
        monitor: &mut ConnectionMonitor,
        now: Instant,
    ) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if let Some(ack) = snapshot.take_matching_ack(active.wire_id) {
            if ack.result == MavResult::MAV_RESULT_ACCEPTED {
                info!("{:?} accepted by vehicle", active.logical);
                match active.logical {
                    VehicleCommand::Arm => monitor.set_state(ConnectionState::Armed),
                    VehicleCommand::Disarm | VehicleCommand::Land => {
                        monitor.set_state(ConnectionState::Connected)
                    }
                    // Airborne status comes from telemetry flight_phase, not
                    // from a command-triggered state bump.
                    VehicleCommand::SetModeAuto | VehicleCommand::Takeoff => {}
                }
            } else {
                warn!("{:?} rejected by vehicle: {:?}", active.logical, ack.result);
            }
            self.active = None;
            return;
        }

        if now.duration_since(active.last_sent_time) < ACK_TIMEOUT {
            return;
        }

        if active.retry_count >= active.max_retries {
            warn!(
                "{:?}: no ack after {} retries, giving up",
                active.logical, active.retry_count
            );
            self.active = None;
            return;
        }

        active.retry_count += 1;
        active.last_sent_time = now;
        warn!(
            "{:?}: ack timeout, retry {}/{}",
            active.logical, active.retry_count, active.max_retries
        );
        if let Some(sender) = self.sender.as_mut() {
            if let Err(e) = sender.send_command(active.wire_id, active.params) {
                warn!("{:?} resend failed: {:#}", active.logical, e);
            }
        }
    }
}

fn wire_params(cmd: VehicleCommand, takeoff_altitude_m: f32) -> [f32; 7] {
    match cmd {
        VehicleCommand::Arm => [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        VehicleCommand::Disarm => [0.0; 7],
        VehicleCommand::SetModeAuto => {
            [MavMode::MAV_MODE_AUTO_ARMED as u32 as f32, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        }
        VehicleCommand::Takeoff => [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, takeoff_altitude_m],
        VehicleCommand::Land => [0.0; 7],
    }
}
