//! Usage: Pick the gateway's loopback port (preferred first, then the fixed fallback range).

use crate::infra::settings::{DEFAULT_GATEWAY_PORT, MAX_GATEWAY_PORT};

pub(crate) const GATEWAY_BIND_HOST: &str = "127.0.0.1";

pub(crate) fn format_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Preferred port (when non-zero) first, then the fixed range without repeating it.
fn port_candidates(preferred: Option<u16>) -> impl Iterator<Item = u16> {
    let preferred = preferred.filter(|port| *port > 0);
    preferred.into_iter().chain(
        (DEFAULT_GATEWAY_PORT..=MAX_GATEWAY_PORT).filter(move |port| Some(*port) != preferred),
    )
}

fn bind_loopback(bind_host: &str, port: u16) -> Option<std::net::TcpListener> {
    let listener = std::net::TcpListener::bind((bind_host, port)).ok()?;
    // Handed to tokio afterwards, which requires non-blocking sockets.
    listener.set_nonblocking(true).ok()?;
    Some(listener)
}

pub(crate) fn bind_first_available(
    bind_host: &str,
    preferred: Option<u16>,
) -> Result<(u16, std::net::TcpListener), String> {
    port_candidates(preferred)
        .find_map(|port| bind_loopback(bind_host, port).map(|listener| (port, listener)))
        .ok_or_else(|| {
            format!(
                "no free port for {bind_host} (preferred {preferred:?}, range {DEFAULT_GATEWAY_PORT}..={MAX_GATEWAY_PORT})"
            )
        })
}
