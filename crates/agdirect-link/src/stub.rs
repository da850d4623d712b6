//! In-process AGDirect server for tests and local experiments.
//!
//! Speaks the server half of the protocol: greeting, then a loop of
//! operation in, reply out. What each operation returns is up to a handler.

use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use agdirect_transport::{LinkStream, Port, TcpEndpoint};
use agdirect_wire::tags::AG_DIRECT_LEVEL;
use agdirect_wire::{Operation, Value, ValueReader, ValueWriter, WireConfig, WireError};
use tracing::{debug, warn};

use crate::control::{OP_DISCONNECT, OP_VERIFY, VERIFY_PREFIX};
use crate::error::Result;
use crate::handshake::{send_greeting, Greeting};

/// A handler's answer to one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Success with these result values.
    Values(Vec<Value>),
    /// Application error; the first value is the message, the second an
    /// optional detail.
    Error(Vec<Value>),
}

impl Reply {
    pub fn error(message: &str) -> Self {
        Reply::Error(vec![Value::from(message)])
    }
}

type Handler = dyn Fn(&Operation) -> Reply + Send + Sync;

/// Handler that answers `:verify`, fails `error` with its own arguments,
/// and echoes every other operation's arguments back.
pub fn echo_handler(op: &Operation) -> Reply {
    if op.name == OP_VERIFY {
        let version = format!(
            "{VERIFY_PREFIX} {} (stub) server level {AG_DIRECT_LEVEL}",
            env!("CARGO_PKG_VERSION")
        );
        return Reply::Values(vec![Value::from(version)]);
    }
    if op.name == "error" {
        return Reply::Error(op.values.clone());
    }
    Reply::Values(op.values.clone())
}

/// A bound, not yet serving, stub server.
pub struct StubServer {
    endpoint: TcpEndpoint,
    handler: Arc<Handler>,
    greeting: Option<Greeting>,
    wire: WireConfig,
}

impl StubServer {
    /// Bind on `addr` (use port 0 for an ephemeral port).
    pub fn bind<F>(addr: &str, handler: F) -> Result<Self>
    where
        F: Fn(&Operation) -> Reply + Send + Sync + 'static,
    {
        Ok(Self {
            endpoint: TcpEndpoint::bind(addr)?,
            handler: Arc::new(handler),
            greeting: Some(Greeting::Accept),
            wire: WireConfig::default(),
        })
    }

    /// Greet every connection with `greeting`. Anything but
    /// [`Greeting::Accept`] closes the connection right after.
    pub fn with_greeting(mut self, greeting: Greeting) -> Self {
        self.greeting = Some(greeting);
        self
    }

    /// Never send a greeting; clients see a greeting timeout.
    pub fn silent(mut self) -> Self {
        self.greeting = None;
        self
    }

    /// Encoding options for replies.
    pub fn with_wire_config(mut self, wire: WireConfig) -> Self {
        self.wire = wire;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port()
    }

    /// Serve connections on background threads, one per connection.
    pub fn spawn(self) -> StubHandle {
        let addr = self.local_addr();
        let stop = Arc::new(AtomicBool::new(false));
        let served = Arc::new(AtomicU64::new(0));
        let thread = {
            let stop = Arc::clone(&stop);
            let served = Arc::clone(&served);
            thread::spawn(move || self.accept_loop(&stop, &served))
        };
        StubHandle {
            addr,
            stop,
            served,
            thread: Some(thread),
        }
    }

    fn accept_loop(self, stop: &AtomicBool, served: &Arc<AtomicU64>) {
        loop {
            let accepted = self.endpoint.accept();
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let stream = match accepted {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "stub accept failed");
                    continue;
                }
            };
            let handler = Arc::clone(&self.handler);
            let served = Arc::clone(served);
            let (greeting, wire) = (self.greeting, self.wire);
            thread::spawn(move || {
                match serve_connection(stream, handler.as_ref(), greeting, wire) {
                    Ok(count) => {
                        served.fetch_add(count, Ordering::SeqCst);
                    }
                    Err(err) => debug!(error = %err, "stub session ended with error"),
                }
            });
        }
    }
}

/// A running stub server. Stops when dropped.
pub struct StubHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    served: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl StubHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Replies sent by sessions that have finished.
    pub fn served_calls(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Sessions already running finish on their own.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        // wake the blocked accept
        if let Err(err) = TcpStream::connect(self.addr) {
            debug!(addr = %self.addr, error = %err, "stub accept wake-up failed");
        }
        if thread.join().is_err() {
            warn!(addr = %self.addr, "stub accept loop panicked");
        }
    }
}

impl Drop for StubHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Serve one accepted stream until the client disconnects.
///
/// Requests numbered zero get no reply. Others get a reply carrying the
/// request's name and the absolute request number, negated for
/// [`Reply::Error`]. Returns the number of replies sent.
pub fn serve_connection(
    mut stream: LinkStream,
    handler: &Handler,
    greeting: Option<Greeting>,
    wire: WireConfig,
) -> Result<u64> {
    let Some(greeting) = greeting else {
        // wait for the client to give up
        let mut sink = Vec::new();
        if let Err(err) = std::io::Read::read_to_end(&mut stream, &mut sink) {
            debug!(error = %err, "silent stub read ended");
        }
        return Ok(0);
    };
    send_greeting(&mut stream, greeting)?;
    if greeting != Greeting::Accept {
        if let Err(err) = stream.shutdown() {
            debug!(error = %err, "stub shutdown after refusal failed");
        }
        return Ok(0);
    }

    let peer = stream.peer_addr().unwrap_or_default();
    let mut port = Port::new(stream);
    let mut replies = 0u64;
    loop {
        let op = match ValueReader::with_config(&mut port, wire).read_operation() {
            Ok(op) => op,
            Err(WireError::ConnectionClosed) => break,
            Err(err) => return Err(err.into()),
        };
        if op.name == OP_DISCONNECT {
            debug!(%peer, "client said goodbye");
            break;
        }
        let reply = handler(&op);
        if op.number == 0 {
            continue;
        }
        let number = op.number.abs();
        let (number, values) = match reply {
            Reply::Values(values) => (number, values),
            Reply::Error(values) => (-number, values),
        };
        let mut writer = ValueWriter::with_config(&mut port, wire);
        writer.write_request(&op.name, number, &values)?;
        writer.flush()?;
        replies += 1;
    }
    if let Err(err) = port.get_ref().shutdown() {
        debug!(%peer, error = %err, "stub socket shutdown failed");
    }
    Ok(replies)
}
