//! RESP2 handoff queue client.
//!
//! A minimal client for Redis-protocol stores, issuing `RPUSH` (push the
//! artifact path) and `EXPIRE` (refresh the queue key's TTL). Only the
//! reply types those commands produce are parsed. All socket operations
//! carry bounded timeouts so a dead queue endpoint cannot stall rotation.

use super::HandoffQueue;
use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Default bound on connect/read/write operations.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// A handoff queue backed by a RESP2 (Redis-protocol) store.
///
/// The connection is shared across all sessions' publish calls; it carries
/// no session-affinity state, and a failed call drops the connection so the
/// next publish reconnects.
pub struct RespHandoffQueue {
    addr: SocketAddr,
    timeout: Duration,
    conn: Mutex<Option<TcpStream>>,
}

impl RespHandoffQueue {
    /// Creates a client for the given store address.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    /// Sets the connect/read/write timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn connect(&self) -> CoreResult<TcpStream> {
        let stream = TcpStream::connect_timeout(&self.addr, self.timeout)
            .map_err(|e| CoreError::handoff(format!("connect {}: {e}", self.addr)))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|()| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| CoreError::handoff(format!("socket setup: {e}")))?;
        Ok(stream)
    }

    fn exchange(&self, stream: &mut TcpStream, command: &[&str]) -> CoreResult<()> {
        let encoded = encode_command(command);
        stream
            .write_all(&encoded)
            .map_err(|e| CoreError::handoff(format!("write: {e}")))?;

        let mut reader = BufReader::new(stream);
        read_reply(&mut reader)
    }
}

impl HandoffQueue for RespHandoffQueue {
    fn publish(&self, queue_name: &str, artifact: &str, ttl: Duration) -> CoreResult<()> {
        let mut guard = self.conn.lock();
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect()?,
        };

        let result = self
            .exchange(&mut stream, &["RPUSH", queue_name, artifact])
            .and_then(|()| {
                if ttl.is_zero() {
                    return Ok(());
                }
                let secs = ttl.as_secs().to_string();
                self.exchange(&mut stream, &["EXPIRE", queue_name, &secs])
            });

        // Keep healthy connections; drop failed ones so the next publish
        // reconnects
        if result.is_ok() {
            *guard = Some(stream);
        }
        result
    }
}

impl std::fmt::Debug for RespHandoffQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespHandoffQueue")
            .field("addr", &self.addr)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Encodes a command as a RESP array of bulk strings.
fn encode_command(parts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Reads one reply, accepting the types RPUSH/EXPIRE produce.
fn read_reply<R: BufRead>(reader: &mut R) -> CoreResult<()> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| CoreError::handoff(format!("read: {e}")))?;

    let line = line.trim_end_matches(['\r', '\n']);
    match line.as_bytes().first() {
        Some(b':') | Some(b'+') => Ok(()),
        Some(b'-') => Err(CoreError::handoff(format!("store error: {}", &line[1..]))),
        Some(b'$') => {
            // Bulk reply: consume the payload and trailing CRLF
            let len: i64 = line[1..]
                .parse()
                .map_err(|_| CoreError::handoff(format!("bad bulk length: {line}")))?;
            if len >= 0 {
                let mut payload = vec![0u8; (len as usize) + 2];
                reader
                    .read_exact(&mut payload)
                    .map_err(|e| CoreError::handoff(format!("read bulk: {e}")))?;
            }
            Ok(())
        }
        Some(_) => Err(CoreError::handoff(format!("unexpected reply: {line}"))),
        None => Err(CoreError::handoff("connection closed before reply")),
    }
}
