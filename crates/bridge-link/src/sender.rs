use anyhow::Result;
use mavlink::common::{MavCmd, MavComponent, MavMessage, COMMAND_LONG_DATA};
use mavlink::MavHeader;

use bridge_command::CommandSender;

use crate::transport::UdpLink;
use crate::{codec, GCS_COMPONENT_ID, GCS_SYSTEM_ID};

/// COMMAND_LONG sender addressed to the vehicle's autopilot component.
pub struct MavCommandLink {
    link: UdpLink,
    header: MavHeader,
    target_system: u8,
}

impl MavCommandLink {
    pub fn new(link: UdpLink, target_system: u8) -> Self {
        Self {
            link,
            header: MavHeader {
                system_id: GCS_SYSTEM_ID,
                component_id: GCS_COMPONENT_ID,
                sequence: 0,
            },
            target_system,
        }
    }
}

impl CommandSender for MavCommandLink {
    fn send_command(&mut self, command: MavCmd, params: [f32; 7]) -> Result<()> {
        let cmd = COMMAND_LONG_DATA {
            target_system: self.target_system,
            // target component is always the autopilot
            target_component: MavComponent::MAV_COMP_ID_AUTOPILOT1 as u8,
            command: command.into(),
            confirmation: 1,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        };
        self.header.sequence = self.header.sequence.wrapping_add(1);
        let bytes = codec::encode(self.header, &MavMessage::COMMAND_LONG(cmd))?;
        self.link.send(&bytes)
    }
}
