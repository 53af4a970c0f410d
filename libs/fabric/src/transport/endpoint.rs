use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{
    TcpTransport, TcpTransportListener, Transport, UnixTransport, UnixTransportListener,
};

/// A parsed connection string
///
/// Accepted forms are `tcp://host:port`, a bare `host:port`, `tcp://*:port`
/// for binding on every interface, and `ipc:///path/to/socket`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `host:port`, resolved when connecting or binding
    Tcp(String),
    /// Filesystem path of a Unix domain socket
    Unix(PathBuf),
}

impl Endpoint {
    /// Open a transport to this endpoint
    pub async fn connect(&self, timeout: Option<Duration>) -> Result<Box<dyn Transport>> {
        match self {
            Endpoint::Tcp(addr) => {
                let mut builder = TcpTransport::builder().address(addr.as_str());
                if let Some(timeout) = timeout {
                    builder = builder.connect_timeout(timeout);
                }
                Ok(Box::new(builder.connect().await?))
            }
            Endpoint::Unix(path) => {
                let mut builder = UnixTransport::builder().path(path);
                if let Some(timeout) = timeout {
                    builder = builder.connect_timeout(timeout);
                }
                Ok(Box::new(builder.connect().await?))
            }
        }
    }

    /// Bind a listener on this endpoint
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(&self) -> Result<EndpointListener> {
        match self {
            Endpoint::Tcp(addr) => Ok(EndpointListener::Tcp(TcpTransportListener::bind(addr)?)),
            Endpoint::Unix(path) => Ok(EndpointListener::Unix(UnixTransportListener::bind(path)?)),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix("tcp://") {
            return parse_host_port(rest);
        }

        if let Some(rest) = s.strip_prefix("ipc://") {
            if rest.is_empty() {
                return Err(Error::InvalidAddress(format!("missing socket path in {s:?}")));
            }
            return Ok(Endpoint::Unix(PathBuf::from(rest)));
        }

        if s.contains("://") {
            return Err(Error::InvalidAddress(format!("unsupported scheme in {s:?}")));
        }

        parse_host_port(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

fn parse_host_port(s: &str) -> Result<Endpoint> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidAddress(format!("expected host:port, got {s:?}")))?;

    if host.is_empty() {
        return Err(Error::InvalidAddress(format!("missing host in {s:?}")));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| Error::InvalidAddress(format!("invalid port in {s:?}")))?;

    let host = if host == "*" { "0.0.0.0" } else { host };
    Ok(Endpoint::Tcp(format!("{host}:{port}")))
}

/// A bound listener for any endpoint kind
pub enum EndpointListener {
    Tcp(TcpTransportListener),
    Unix(UnixTransportListener),
}

impl EndpointListener {
    /// Accept the next incoming connection
    pub async fn accept(&self) -> Result<Box<dyn Transport>> {
        match self {
            EndpointListener::Tcp(listener) => {
                let (transport, _) = listener.accept().await?;
                Ok(Box::new(transport))
            }
            EndpointListener::Unix(listener) => Ok(Box::new(listener.accept().await?)),
        }
    }

    /// The endpoint peers should connect to
    ///
    /// For TCP listeners bound to port 0 this reports the assigned port.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            EndpointListener::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
            EndpointListener::Unix(listener) => Ok(Endpoint::Unix(listener.path().to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_forms() {
        assert_eq!(
            "tcp://localhost:49853".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp("localhost:49853".into())
        );
        assert_eq!(
            "127.0.0.1:8080".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp("127.0.0.1:8080".into())
        );
        assert_eq!(
            "tcp://*:48944".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp("0.0.0.0:48944".into())
        );
        assert_eq!(
            "tcp://[::1]:9000".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp("[::1]:9000".into())
        );
    }

    #[test]
    fn parses_ipc() {
        assert_eq!(
            "ipc:///tmp/pushbus.sock".parse::<Endpoint>().unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/pushbus.sock"))
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        for bad in ["", "tcp://", "localhost", "tcp://:80", "tcp://host:notaport", "udp://h:1", "ipc://"] {
            assert!(
                matches!(bad.parse::<Endpoint>(), Err(Error::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_roundtrips() {
        for s in ["tcp://localhost:1", "ipc:///run/x.sock"] {
            let endpoint: Endpoint = s.parse().unwrap();
            assert_eq!(endpoint.to_string(), s);
        }
    }

    #[tokio::test]
    async fn port_zero_reports_assigned_port() {
        let listener = "tcp://127.0.0.1:0".parse::<Endpoint>().unwrap().bind().unwrap();
        match listener.local_endpoint().unwrap() {
            Endpoint::Tcp(addr) => assert!(!addr.ends_with(":0")),
            other => panic!("unexpected endpoint {other:?}"),
        }
    }
}
