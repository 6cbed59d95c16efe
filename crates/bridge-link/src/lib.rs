pub mod codec;
pub mod heartbeat;
pub mod sender;
pub mod transport;

use mavlink::common::MavComponent;

/// Fixed ground-side identity. Stable, non-broadcast, and distinct from any
/// legitimate vehicle id so our own heartbeats can be filtered out of
/// ingestion.
pub const GCS_SYSTEM_ID: u8 = 250;
pub const GCS_COMPONENT_ID: u8 = MavComponent::MAV_COMP_ID_MISSIONPLANNER as u8;

pub use heartbeat::GcsHeartbeat;
pub use sender::MavCommandLink;
pub use transport::UdpLink;
