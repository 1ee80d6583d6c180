//! Per-connection echo handling.
//!
//! The handler performs exactly one bounded read per readiness event and
//! returns control to the server loop, so a connected-but-silent client
//! never stalls service to others. It holds no state across invocations.

use crate::conn::Connection;
use bytes::BytesMut;
use std::io::{self, Read, Write};
use tracing::{debug, info};

/// What the server loop should do with the connection afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep the connection in the watched set.
    Continue,
    /// The peer ended the stream or the socket failed; remove it.
    Close,
}

/// Handle one readiness event on a client connection.
///
/// Reads at most `buf.len()` bytes. On data, writes back `"<tag>: "` followed
/// by the received bytes. A zero-byte read means peer EOF; read or write
/// failures (reset, broken pipe) are treated the same way. Either reports
/// `Close` without touching the rest of the loop.
pub fn handle(conn: &mut Connection, tag: &str, buf: &mut [u8]) -> Outcome {
    let n = match conn.stream.read(buf) {
        Ok(0) => {
            debug!(peer = %conn.peer, "Peer closed stream");
            return Outcome::Close;
        }
        Ok(n) => n,
        // Spurious readiness; nothing to do this round.
        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Outcome::Continue,
        Err(e) => {
            debug!(peer = %conn.peer, error = %e, "Read failed");
            return Outcome::Close;
        }
    };

    let mut response = BytesMut::with_capacity(tag.len() + 2 + n);
    response.extend_from_slice(tag.as_bytes());
    response.extend_from_slice(b": ");
    response.extend_from_slice(&buf[..n]);

    info!(peer = %conn.peer, bytes = n, "Echo");

    match write_full(&mut conn.stream, &response) {
        Ok(()) => Outcome::Continue,
        Err(e) => {
            debug!(peer = %conn.peer, error = %e, "Write failed");
            Outcome::Close
        }
    }
}

/// Write the whole response or fail.
///
/// Responses are bounded by the read buffer plus the tag, well under the
/// socket send buffer, so WouldBlock retries are rare and short-lived.
fn write_full<W: Write>(writer: &mut W, mut remaining: &[u8]) -> io::Result<()> {
    while !remaining.is_empty() {
        match writer.write(remaining) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => remaining = &remaining[n..],
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
