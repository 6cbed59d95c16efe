pub mod gate;
pub mod manager;

use anyhow::Result;
use mavlink::common::MavCmd;

pub use manager::CommandManager;

/// The five high-level actions this bridge knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleCommand {
    Arm,
    Disarm,
    SetModeAuto,
    Takeoff,
    Land,
}

impl std::str::FromStr for VehicleCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arm" => Ok(Self::Arm),
            "disarm" => Ok(Self::Disarm),
            "auto" | "set-auto" => Ok(Self::SetModeAuto),
            "takeoff" => Ok(Self::Takeoff),
            "land" => Ok(Self::Land),
            other => anyhow::bail!("unknown command {:?}", other),
        }
    }
}

/// Outbound command transport, bound once at startup.
///
/// A send failure is reported but non-fatal; the retry path may succeed
/// later.
pub trait CommandSender: Send {
    fn send_command(&mut self, command: MavCmd, params: [f32; 7]) -> Result<()>;
}
