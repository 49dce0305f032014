//! Local network information for the connection URL display.
//!
//! Clients need something to type into a browser; the app shows them
//! `ws://<local-ip>:<port>`.  The address is purely informational — nothing
//! in the pipeline consumes it — so failure to determine it degrades to a
//! "not connected" display, never an error.
//!
//! # How the address is determined
//!
//! A UDP socket is "connected" to a public address.  Connecting a UDP socket
//! sends no packets; it only asks the OS routing table which local interface
//! would be used, and `local_addr` then reveals that interface's address.
//! That is exactly the address LAN peers can reach us at, and it works
//! without enumerating interfaces or requiring any permissions.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Probe target for the routing lookup.  Never actually contacted.
const PROBE_ADDR: (&str, u16) = ("8.8.8.8", 80);

/// Returns the non-loopback IPv4 address of the active network interface,
/// or `None` when the host has no usable network.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(PROBE_ADDR).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if is_displayable(ip) => Some(ip),
        _ => None,
    }
}

/// The WebSocket URL clients connect to, or `None` when no non-loopback
/// IPv4 address is available (callers display "not connected").
pub fn websocket_url(port: u16) -> Option<String> {
    local_ipv4().map(|ip| format_url(ip, port))
}

fn format_url(ip: Ipv4Addr, port: u16) -> String {
    format!("ws://{ip}:{port}")
}

/// Loopback and unspecified addresses are unreachable from other devices
/// and would only confuse the user.
fn is_displayable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_url_uses_ws_scheme() {
        let url = format_url(Ipv4Addr::new(192, 168, 1, 100), 8080);
        assert_eq!(url, "ws://192.168.1.100:8080");
    }

    #[test]
    fn test_loopback_and_unspecified_are_not_displayable() {
        assert!(!is_displayable(Ipv4Addr::LOCALHOST));
        assert!(!is_displayable(Ipv4Addr::UNSPECIFIED));
        assert!(is_displayable(Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[test]
    fn test_local_ipv4_never_returns_loopback() {
        // The host running tests may or may not have a network; both
        // outcomes are valid, but a returned address must be displayable.
        if let Some(ip) = local_ipv4() {
            assert!(is_displayable(ip));
        }
    }
}
