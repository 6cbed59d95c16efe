//! Thin glue over rust-mavlink's frame codec.
//!
//! Inbound datagrams carry one or more complete MAVLink 2 frames; malformed
//! or truncated bytes are absorbed here and simply produce no message.

use std::io::Cursor;

use anyhow::{Context, Result};
use mavlink::common::MavMessage;
use mavlink::MavHeader;

/// Decode every parseable frame in a received datagram.
pub fn decode_datagram(buf: &[u8]) -> Vec<(MavHeader, MavMessage)> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(buf);
    loop {
        let before = cursor.position();
        if before as usize >= buf.len() {
            break;
        }
        match mavlink::read_v2_msg::<MavMessage, _>(&mut cursor) {
            Ok(pair) => out.push(pair),
            Err(_) => {
                // Resync after a bad frame, but never without forward
                // progress.
                if cursor.position() == before {
                    break;
                }
            }
        }
    }
    out
}

/// Encode a single outbound frame.
pub fn encode(header: MavHeader, msg: &MavMessage) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(280);
    mavlink::write_v2_msg(&mut buf, header, msg).context("encode mavlink frame")?;
    Ok(buf)
}
