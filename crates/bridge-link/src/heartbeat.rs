use std::time::{Duration, Instant};

use anyhow::Result;
use mavlink::common::{MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA};
use mavlink::MavHeader;

use crate::transport::UdpLink;
use crate::{codec, GCS_COMPONENT_ID, GCS_SYSTEM_ID};

pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(1000);

/// Fixed-cadence ground-station self-identification beacon.
pub struct GcsHeartbeat {
    link: UdpLink,
    header: MavHeader,
    last_sent: Option<Instant>,
}

impl GcsHeartbeat {
    pub fn new(link: UdpLink) -> Self {
        Self {
            link,
            header: MavHeader {
                system_id: GCS_SYSTEM_ID,
                component_id: GCS_COMPONENT_ID,
                sequence: 0,
            },
            last_sent: None,
        }
    }

    /// Send if a period has elapsed. A failed send is reported to the caller
    /// but does not reset the cadence.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if let Some(t) = self.last_sent {
            if now.duration_since(t) < HEARTBEAT_PERIOD {
                return Ok(());
            }
        }
        self.last_sent = Some(now);

        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GCS,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.header.sequence = self.header.sequence.wrapping_add(1);
        let bytes = codec::encode(self.header, &MavMessage::HEARTBEAT(hb))?;
        self.link.send(&bytes)
    }
}
