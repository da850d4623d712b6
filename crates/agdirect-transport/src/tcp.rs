use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// How a client connection is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    /// Number of connect attempts before giving up. Zero is treated as one.
    pub poll_count: u32,
    /// Pause between two connect attempts.
    pub poll_interval: Duration,
    /// Timeout for each individual connect attempt.
    pub timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            poll_count: 3,
            poll_interval: Duration::from_millis(1000),
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Open a TCP connection to `host:port`, retrying up to `poll_count` times.
///
/// The returned stream has `TCP_NODELAY` set; requests are already coalesced
/// by the port buffer, so Nagle would only add latency.
pub fn connect(host: &str, port: u16, config: &ConnectConfig) -> Result<LinkStream> {
    let addr = format!("{host}:{port}");
    let attempts = config.poll_count.max(1);
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no connect attempt made");

    for attempt in 0..attempts {
        if attempt > 0 {
            std::thread::sleep(config.poll_interval);
        }
        match connect_once(&addr, config.timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(%addr, attempt = attempt + 1, "connected");
                return Ok(LinkStream::from_tcp(stream));
            }
            Err(err) => {
                debug!(%addr, attempt = attempt + 1, error = %err, "connect attempt failed");
                last_err = err;
            }
        }
    }

    Err(TransportError::Connect {
        addr,
        attempts,
        source: last_err,
    })
}

fn connect_once(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(
        io::ErrorKind::NotFound,
        format!("no address found for {addr}"),
    );
    for sock_addr in addr.to_socket_addrs()? {
        let attempt = if timeout.is_zero() {
            TcpStream::connect(sock_addr)
        } else {
            TcpStream::connect_timeout(&sock_addr, timeout)
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

/// Listening TCP endpoint, used by the in-process stub server.
pub struct TcpEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:0` for an ephemeral port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        info!(%local_addr, "listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok(LinkStream::from_tcp(stream))
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }
}
