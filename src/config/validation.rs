//! Listen address validation.
//!
//! # Responsibilities
//! - Join host and port into a display address
//! - Resolve the pair to a single TCP socket address
//!
//! # Design Decisions
//! - Empty host binds every IPv4 interface
//! - Empty port means port 0 (OS-assigned)
//! - Hostnames resolve through the system resolver; IPv4 results preferred

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use crate::error::ConfigError;

/// Format `host:port`, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: &str) -> String {
    let host = strip_brackets(host);
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Resolve host and port into the address the listener binds.
pub fn resolve_listen_addr(host: &str, port: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAddress {
        addr: join_host_port(host, port),
        reason,
    };

    let port: u16 = if port.is_empty() {
        0
    } else {
        port.parse()
            .map_err(|_| invalid(format!("invalid port {:?}", port)))?
    };

    let host = strip_brackets(host);
    if host.is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let resolved: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .collect();

    resolved
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| resolved.first())
        .copied()
        .ok_or_else(|| invalid("host resolved to no addresses".to_string()))
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
