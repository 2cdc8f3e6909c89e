//! TCP connection enumeration.
//!
//! Parses `/proc/net/tcp` and `/proc/net/tcp6` on Linux. Only connections in
//! the `ESTABLISHED` state are reported; listeners have no remote peer.
//!
//! Addresses in these files are hex dumps of the kernel's network-order
//! words as loaded in host order, so decoding goes through `to_ne_bytes`.

use crate::error::{MonitorError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Kernel TCP state code for `ESTABLISHED`.
const TCP_ESTABLISHED: &str = "01";

/// An established TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Local endpoint.
    pub local: SocketAddr,
    /// Remote endpoint.
    pub remote: SocketAddr,
}

impl Connection {
    /// Resource name used in samples: `Socket (local <-> remote)`.
    #[must_use]
    pub fn resource_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Socket ({} <-> {})", self.local, self.remote)
    }
}

/// Returns every established IPv4 and IPv6 TCP connection.
///
/// # Errors
///
/// Returns [`MonitorError::SampleUnavailable`] if `/proc/net/tcp` cannot be
/// read. A missing `/proc/net/tcp6` (IPv6 disabled) is not an error.
#[cfg(target_os = "linux")]
pub fn established_connections() -> Result<Vec<Connection>> {
    let v4 = std::fs::read_to_string("/proc/net/tcp").map_err(|e| {
        MonitorError::unavailable("sockets", format!("Failed to read /proc/net/tcp: {e}"))
    })?;
    let mut connections = parse_proc_net_tcp(&v4);

    if let Ok(v6) = std::fs::read_to_string("/proc/net/tcp6") {
        connections.extend(parse_proc_net_tcp(&v6));
    }

    Ok(connections)
}

/// Connection enumeration is only implemented for Linux.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(target_os = "linux"))]
pub fn established_connections() -> Result<Vec<Connection>> {
    Ok(Vec::new())
}

/// Parses the body of a `/proc/net/tcp` or `/proc/net/tcp6` file.
///
/// Malformed rows are skipped.
#[must_use]
pub fn parse_proc_net_tcp(content: &str) -> Vec<Connection> {
    content
        .lines()
        .skip(1) // header
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<Connection> {
    // sl local_address rem_address st ...
    let mut fields = line.split_whitespace().skip(1);
    let local = fields.next()?;
    let remote = fields.next()?;
    let state = fields.next()?;
    if state != TCP_ESTABLISHED {
        return None;
    }
    Some(Connection { local: parse_endpoint(local)?, remote: parse_endpoint(remote)? })
}

/// Decodes `ADDR:PORT` where `ADDR` is 8 (IPv4) or 32 (IPv6) hex digits.
fn parse_endpoint(field: &str) -> Option<SocketAddr> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let ip = match addr.len() {
        8 => IpAddr::V4(Ipv4Addr::from(parse_word(addr)?)),
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                chunk.copy_from_slice(&parse_word(addr.get(i * 8..i * 8 + 8)?)?);
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    Some(SocketAddr::new(ip, port))
}

fn parse_word(hex: &str) -> Option<[u8; 4]> {
    u32::from_str_radix(hex, 16).ok().map(u32::to_ne_bytes)
}
