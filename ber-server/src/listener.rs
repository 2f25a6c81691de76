//! TCP listener set: binds one or more addresses, with `SO_REUSEPORT` so
//! every worker can independently accept connections on the same fixed
//! port, or (for a port range) probes for a free port per worker.

use crate::config::BindSpec;
use ber_core::{BerError, BerResult};
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpSocket};

/// Bind a single `SO_REUSEPORT` listener on `addr`.
///
/// Native to tokio (`TcpSocket::set_reuseport`), so N independently
/// scheduled workers can all accept on the same port without a shared
/// listener.
pub fn bind_reuseport(addr: SocketAddr) -> BerResult<TcpListener> {
    let socket = new_socket(addr)?;
    socket.set_reuseaddr(true).map_err(BerError::Io)?;
    socket.set_reuseport(true).map_err(BerError::Io)?;
    finish_bind(socket, addr)
}

/// Bind a plain (non-reuseport) listener on `addr`. Used for port-range
/// probing, where a bind failure must mean "already taken" rather than
/// silently succeeding via `SO_REUSEPORT`.
fn bind_plain(addr: SocketAddr) -> BerResult<TcpListener> {
    let socket = new_socket(addr)?;
    finish_bind(socket, addr)
}

fn new_socket(addr: SocketAddr) -> BerResult<TcpSocket> {
    if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(BerError::Io)
}

fn finish_bind(socket: TcpSocket, addr: SocketAddr) -> BerResult<TcpListener> {
    socket.bind(addr).map_err(|e| BerError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;

    socket.listen(1024).map_err(|e| BerError::Bind {
        addr: addr.to_string(),
        source: e,
    })
}

/// Probe `min_port..=max_port` on `ip` in order, binding (without
/// `SO_REUSEPORT`) the first free port found.
pub fn bind_port_range(ip: IpAddr, min_port: u16, max_port: u16) -> BerResult<TcpListener> {
    let mut last_err = None;
    for port in min_port..=max_port {
        match bind_plain(SocketAddr::new(ip, port)) {
            Ok(listener) => return Ok(listener),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        BerError::InvalidConfig(format!(
            "no free port in range {}..={} on {}",
            min_port, max_port, ip
        ))
    }))
}

/// Bind every configured address for one worker.
pub fn bind_all(specs: &[BindSpec]) -> BerResult<Vec<TcpListener>> {
    specs
        .iter()
        .map(|spec| match spec {
            BindSpec::Fixed(addr) => bind_reuseport(*addr),
            BindSpec::Range {
                ip,
                min_port,
                max_port,
            } => bind_port_range(*ip, *min_port, *max_port),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_an_ephemeral_port() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = bind_reuseport(addr).unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn probes_a_port_range_for_the_first_free_port() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        // Reserve one port, then probe a range starting at it: the probe
        // must skip the taken port and claim the next one.
        let taken = bind_plain(SocketAddr::new(ip, 0)).unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        let listener = bind_port_range(ip, taken_port, taken_port + 50).unwrap();
        let bound_port = listener.local_addr().unwrap().port();
        assert_ne!(bound_port, taken_port);
        assert!(bound_port > taken_port);
    }

    #[test]
    fn bind_spec_parses_fixed_and_range_forms() {
        let fixed: BindSpec = "127.0.0.1:8080".parse().unwrap();
        assert!(matches!(fixed, BindSpec::Fixed(_)));

        let range: BindSpec = "127.0.0.1:8000-8100".parse().unwrap();
        match range {
            BindSpec::Range { min_port, max_port, .. } => {
                assert_eq!(min_port, 8000);
                assert_eq!(max_port, 8100);
            }
            _ => panic!("expected a range"),
        }

        assert!("127.0.0.1:9000-8000".parse::<BindSpec>().is_err());
    }
}
