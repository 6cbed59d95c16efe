use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use bridge_command::{CommandManager, VehicleCommand};
use bridge_link::{GcsHeartbeat, MavCommandLink, UdpLink, GCS_SYSTEM_ID};
use bridge_state::ConnectionMonitor;
use bridge_telemetry::{TelemetryIngestor, TelemetrySnapshot};

/// Poll interval for the blocking UDP read; bounds loop latency.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Minimum spacing between attempts at the same scripted command, so a
/// gate denial does not spam the log every loop iteration.
const SEQUENCE_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Parser)]
#[command(
    name = "gcsbridge",
    version,
    about = "MAVLink ground-control command/telemetry bridge"
)]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the bridge loop until Ctrl-C.
    Run {
        /// Scripted command sequence, issued one at a time once telemetry is
        /// ready (e.g. "arm,auto,takeoff").
        #[arg(long)]
        sequence: Option<String>,
    },
    /// Validate the configuration without opening the link.
    Doctor,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    link: LinkCfg,
    gcs: GcsCfg,
    command: CommandCfg,
}

#[derive(Debug, serde::Deserialize)]
struct LinkCfg {
    /// Telemetry listen endpoint, e.g. "0.0.0.0:14550".
    listen: String,
    /// Autopilot command endpoint, e.g. "127.0.0.1:18570" (PX4 SITL).
    peer: String,
}

#[derive(Debug, serde::Deserialize)]
struct GcsCfg {
    /// System id of the vehicle we command. 1 is common for SITL.
    target_system: u8,
}

#[derive(Debug, serde::Deserialize)]
struct CommandCfg {
    takeoff_altitude_m: f32,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg),
        Command::Run { sequence } => run(&cfg, sequence).await,
    }
}

fn parse_endpoints(cfg: &Config) -> Result<(SocketAddr, SocketAddr)> {
    let listen: SocketAddr = cfg
        .link
        .listen
        .parse()
        .with_context(|| format!("link.listen invalid: {:?}", cfg.link.listen))?;
    let peer: SocketAddr = cfg
        .link
        .peer
        .parse()
        .with_context(|| format!("link.peer invalid: {:?}", cfg.link.peer))?;
    Ok((listen, peer))
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    let (listen, peer) = parse_endpoints(cfg)?;
    anyhow::ensure!(
        listen.port() != peer.port() || listen.ip() != peer.ip(),
        "link.listen and link.peer must differ"
    );
    anyhow::ensure!(cfg.gcs.target_system != 0, "gcs.target_system must be nonzero");
    anyhow::ensure!(
        cfg.gcs.target_system != GCS_SYSTEM_ID,
        "gcs.target_system collides with the ground-side id {}",
        GCS_SYSTEM_ID
    );
    anyhow::ensure!(
        cfg.command.takeoff_altitude_m > 0.0,
        "command.takeoff_altitude_m must be positive"
    );

    info!("doctor: OK");
    Ok(())
}

fn parse_sequence(raw: Option<String>) -> Result<VecDeque<VehicleCommand>> {
    match raw {
        None => Ok(VecDeque::new()),
        Some(s) => s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<VecDeque<_>>>()
            .context("parse --sequence"),
    }
}

async fn run(cfg: &Config, sequence: Option<String>) -> Result<()> {
    info!("run: starting");

    let (listen, peer) = parse_endpoints(cfg)?;
    let sequence = parse_sequence(sequence)?;
    let target_system = cfg.gcs.target_system;
    let takeoff_altitude_m = cfg.command.takeoff_altitude_m;

    let shutdown = Arc::new(AtomicBool::new(false));
    let worker_shutdown = shutdown.clone();
    let mut worker = tokio::task::spawn_blocking(move || {
        bridge_loop(
            listen,
            peer,
            target_system,
            takeoff_altitude_m,
            sequence,
            worker_shutdown,
        )
    });

    tokio::select! {
        res = &mut worker => res.context("bridge loop panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            shutdown.store(true, Ordering::Relaxed);
            worker.await.context("bridge loop panicked")?
        }
    }
}

/// Single-threaded, poll-driven core: receive/decode/ingest, then the
/// periodic failsafe and command lifecycle checks, then scripted
/// sequencing. All state mutation happens here, in this order, every
/// iteration.
fn bridge_loop(
    listen: SocketAddr,
    peer: SocketAddr,
    target_system: u8,
    takeoff_altitude_m: f32,
    mut pending: VecDeque<VehicleCommand>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let link = UdpLink::bind(listen, peer, RECV_TIMEOUT)?;
    let mut beacon = GcsHeartbeat::new(link.try_clone()?);

    let mut manager = CommandManager::new(takeoff_altitude_m);
    manager.bind_sender(Box::new(MavCommandLink::new(link.try_clone()?, target_system)));

    let ingestor = TelemetryIngestor::new(GCS_SYSTEM_ID);
    let mut snapshot = TelemetrySnapshot::new();
    let mut monitor = ConnectionMonitor::new();

    let mut was_ready = false;
    let mut last_sequence_attempt: Option<Instant> = None;
    let mut buf = [0u8; 2048];

    while !shutdown.load(Ordering::Relaxed) {
        if let Err(e) = beacon.tick(Instant::now()) {
            warn!("gcs heartbeat send failed: {:#}", e);
        }

        match link.recv(&mut buf) {
            Ok(Some(n)) => {
                let now = Instant::now();
                for (header, msg) in bridge_link::codec::decode_datagram(&buf[..n]) {
                    ingestor.handle_message(&header, &msg, &mut snapshot, &mut monitor, now);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("udp recv failed: {:#}", e),
        }

        let now = Instant::now();
        monitor.tick(snapshot.heartbeat_age(now), snapshot.link_age(now), now);
        manager.update(&mut snapshot, &mut monitor, now);

        if !was_ready && snapshot.is_telemetry_ready() {
            was_ready = true;
            info!("telemetry ready (sysid {})", snapshot.system_id);
        }

        if let Some(&next) = pending.front() {
            let due = last_sequence_attempt
                .map(|t| now.duration_since(t) >= SEQUENCE_RETRY_INTERVAL)
                .unwrap_or(true);
            if due && snapshot.is_telemetry_ready() && !manager.has_active_command() {
                last_sequence_attempt = Some(now);
                if manager.request(next, &mut snapshot, &monitor, now) {
                    pending.pop_front();
                }
            }
        }
    }

    info!("bridge loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_parses_known_commands() {
        let seq = parse_sequence(Some("arm, auto ,takeoff".into())).unwrap();
        assert_eq!(
            Vec::from(seq),
            vec![
                VehicleCommand::Arm,
                VehicleCommand::SetModeAuto,
                VehicleCommand::Takeoff
            ]
        );
    }

    #[test]
    fn sequence_rejects_unknown_commands() {
        assert!(parse_sequence(Some("arm,launch".into())).is_err());
    }

    #[test]
    fn empty_sequence_is_fine() {
        assert!(parse_sequence(None).unwrap().is_empty());
        assert!(parse_sequence(Some(String::new())).unwrap().is_empty());
    }

    #[test]
    fn config_parses_and_doctor_accepts() {
        let cfg: Config = toml::from_str(
            r#"
            [link]
            listen = "0.0.0.0:14550"
            peer = "127.0.0.1:18570"

            [gcs]
            target_system = 1

            [command]
            takeoff_altitude_m = 2.5
            "#,
        )
        .unwrap();
        assert!(doctor(&cfg).is_ok());
    }

    #[test]
    fn doctor_rejects_identity_collision() {
        let cfg: Config = toml::from_str(
            r#"
            [link]
            listen = "0.0.0.0:14550"
            peer = "127.0.0.1:18570"

            [gcs]
            target_system = 250

            [command]
            takeoff_altitude_m = 2.5
            "#,
        )
        .unwrap();
        assert!(doctor(&cfg).is_err());
    }
}
