pub mod ingest;
pub mod snapshot;

pub use ingest::TelemetryIngestor;
pub use snapshot::{ArmState, BlockReason, CommandAck, FlightPhase, TelemetrySnapshot};
