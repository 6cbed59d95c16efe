use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Link is considered dead once both heartbeat age and any-message age
/// exceed this.
pub const LINK_TIMEOUT: Duration = Duration::from_millis(2000);

/// How often `tick` actually evaluates the failsafe conditions.
pub const FAILSAFE_CHECK_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Armed,
    InAir,
    Failsafe,
}

/// Process-wide connection/failsafe state.
///
/// Created at `Disconnected` and lives for the whole run. Only two writers
/// exist: this monitor's own heartbeat/timeout logic, and the command
/// manager's ack handling (arm/disarm/land outcomes).
#[derive(Debug)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    last_check: Option<Instant>,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_check: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn in_failsafe(&self) -> bool {
        self.state == ConnectionState::Failsafe
    }

    pub fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            info!("connection state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// First accepted vehicle heartbeat establishes the connection.
    pub fn note_heartbeat(&mut self) {
        if self.state == ConnectionState::Disconnected {
            self.set_state(ConnectionState::Connected);
        }
    }

    /// Periodic failsafe detection and recovery.
    ///
    /// `heartbeat_age` is `None` until the first vehicle heartbeat;
    /// `link_age` is `None` until any decoded message. Entry into failsafe
    /// requires BOTH ages to exceed [`LINK_TIMEOUT`], so one silent message
    /// type alone never trips it. Recovery needs only fresh link traffic.
    pub fn tick(
        &mut self,
        heartbeat_age: Option<Duration>,
        link_age: Option<Duration>,
        now: Instant,
    ) {
        if let Some(t) = self.last_check {
            if now.duration_since(t) < FAILSAFE_CHECK_PERIOD {
                return;
            }
        }
        self.last_check = Some(now);

        if self.state == ConnectionState::Failsafe {
            if let Some(rx) = link_age {
                if rx <= LINK_TIMEOUT {
                    info!("link recovered ({}ms since last rx)", rx.as_millis());
                    self.set_state(ConnectionState::Connected);
                }
            }
            return;
        }

        if let (Some(hb), Some(rx)) = (heartbeat_age, link_age) {
            if hb > LINK_TIMEOUT && rx > LINK_TIMEOUT {
                warn!(
                    "link lost: heartbeat {}ms, last rx {}ms",
                    hb.as_millis(),
                    rx.as_millis()
                );
                self.set_state(ConnectionState::Failsafe);
            }
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}
