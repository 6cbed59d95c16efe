use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

/// Datagram link: telemetry arrives on the bound port, commands and
/// heartbeats go out to a fixed peer (the autopilot's command listener).
pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpLink {
    /// Bind failure is fatal at startup; everything after that is
    /// best-effort.
    pub fn bind(listen: SocketAddr, peer: SocketAddr, read_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(listen).with_context(|| format!("bind udp {}", listen))?;
        socket
            .set_read_timeout(Some(read_timeout))
            .context("set udp read timeout")?;
        info!("listening on {}, commanding {}", listen, peer);
        Ok(Self { socket, peer })
    }

    /// Second handle onto the same socket, for the outbound senders.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone().context("clone udp socket")?,
            peer: self.peer,
        })
    }

    /// Blocking-with-timeout receive; `Ok(None)` when the timeout elapses.
    /// Source address is not inspected, there is a single expected peer.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e).context("udp recv"),
        }
    }

    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        self.socket
            .send_to(bytes, self.peer)
            .with_context(|| format!("udp send to {}", self.peer))?;
        Ok(())
    }
}
