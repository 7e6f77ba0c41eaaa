use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Where to bind or connect.
///
/// Accepted forms:
/// - `tcp://host:port` or a bare `host:port`
/// - `unix:///path/to.sock` or a bare path containing `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if let Some(addr) = input.strip_prefix("tcp://") {
            return tcp_endpoint(addr, input);
        }
        if let Some(path) = input.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if input.contains('/') {
            return Ok(Endpoint::Unix(PathBuf::from(input)));
        }
        tcp_endpoint(input, input)
    }
}

fn tcp_endpoint(addr: &str, original: &str) -> Result<Endpoint, TransportError> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(Endpoint::Tcp(addr.to_string()))
        }
        _ => Err(TransportError::InvalidEndpoint(original.to_string())),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
