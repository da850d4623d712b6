use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use agdirect_transport::{LinkStream, Port, Traced};
use agdirect_wire::tags::AG_DIRECT_LEVEL;
use agdirect_wire::{Text, Value};
use tracing::{debug, warn};

use crate::call::{CallStyle, ResultSelector, Session};
use crate::config::LinkConfig;
use crate::control::{ServerInfo, OP_DISCONNECT, OP_VERIFY};
use crate::error::{LinkError, Result};
use crate::gate::{Gate, GateGuard};
use crate::handshake::client_handshake;

/// Pause after `:disconnect` so the message can arrive before the close.
const DISCONNECT_GRACE: Duration = Duration::from_millis(100);

type LinkSession = Session<Traced<LinkStream>>;

/// An established AGDirect connection.
///
/// At most one request is in flight at a time. Calls from several threads
/// (share the connection through an `Arc`) are serialized; each waits for
/// the previous call's reply before its own request is written. A call made
/// by a thread that already holds the connection, through a [`Batch`], fails
/// with [`LinkError::Reentrant`].
///
/// Any fault other than an application error leaves the connection broken;
/// every later call fails with [`LinkError::Broken`].
pub struct Connection {
    gate: Gate<LinkSession>,
    broken: AtomicBool,
    closed: AtomicBool,
    peer: String,
    config: LinkConfig,
}

impl Connection {
    /// Run the client handshake on a freshly connected stream.
    pub fn handshake(mut stream: LinkStream, config: LinkConfig) -> Result<Self> {
        let timeout = config.greeting_timeout();
        client_handshake(&mut stream, timeout)?;
        Ok(Self::from_stream(stream, config))
    }

    /// Wrap a stream whose greeting has already been accepted.
    fn from_stream(stream: LinkStream, config: LinkConfig) -> Self {
        let peer = stream
            .peer_addr()
            .unwrap_or_else(|| stream.transport_name().to_string());
        let traced = Traced::new(stream, config.trace);
        let session = Session::new(Port::new(traced), config.wire_config(), config.trace.calls());
        debug!(peer = %peer, trace = %config.trace, "connection established");
        Self {
            gate: Gate::new(session),
            broken: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            peer,
            config,
        }
    }

    /// Invoke `name` with `args`.
    ///
    /// Returns the reply values for [`CallStyle::TwoWay`], and an empty list
    /// for the other styles.
    pub fn call(&self, name: &str, style: CallStyle, args: &[Value]) -> Result<Vec<Value>> {
        self.call_text(&Text::from(name), style, args)
    }

    /// [`Connection::call`] with a wire-level operation name.
    pub fn call_text(&self, name: &Text, style: CallStyle, args: &[Value]) -> Result<Vec<Value>> {
        let mut session = self.enter()?;
        self.run(&mut session, name, style, args)
    }

    /// Two-way call returning the values picked by `selector`.
    pub fn call_selected(
        &self,
        name: &str,
        args: &[Value],
        selector: ResultSelector,
    ) -> Result<Vec<Value>> {
        let values = self.call(name, CallStyle::TwoWay, args)?;
        self.select(name, values, selector)
    }

    /// Two-way call returning exactly the first value.
    pub fn call_one(&self, name: &str, args: &[Value]) -> Result<Value> {
        let mut values = self.call_selected(name, args, ResultSelector::Index(0))?;
        values.pop().ok_or_else(|| LinkError::MissingResult {
            operation: name.to_string(),
            expected: 1,
            received: 0,
        })
    }

    /// Hold the connection for a run of calls no other thread can interleave.
    ///
    /// The connection is released when the batch is dropped.
    pub fn batch(&self) -> Result<Batch<'_>> {
        let session = self.enter()?;
        Ok(Batch {
            conn: self,
            session,
        })
    }

    /// Ask the server to identify itself.
    ///
    /// A server that answers with anything but an AGDirect version string is
    /// disconnected and reported as [`LinkError::VerifyFailed`].
    pub fn verify(&self) -> Result<ServerInfo> {
        let level = Value::Integer(i64::from(AG_DIRECT_LEVEL));
        let answer = self.call_one(OP_VERIFY, &[level])?;
        let parsed = answer
            .as_text()
            .and_then(|text| ServerInfo::parse(&text.to_string_lossy()));
        match parsed {
            Some(info) => {
                debug!(peer = %self.peer, version = %info.version, level = ?info.server_level, "server verified");
                Ok(info)
            }
            None => {
                if let Err(err) = self.disconnect() {
                    debug!(peer = %self.peer, error = %err, "disconnect after failed verify");
                }
                Err(LinkError::VerifyFailed(answer.to_string()))
            }
        }
    }

    /// Close the connection.
    ///
    /// A healthy idle connection first tells the server with a one-way
    /// `:disconnect`. Waits for an in-flight call on another thread to finish.
    /// Calling it again is a no-op.
    pub fn disconnect(&self) -> Result<()> {
        let session = match self.gate.acquire() {
            Ok(session) => Some(session),
            Err(LinkError::Broken) => None,
            Err(err) => return Err(err),
        };
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(mut session) = session {
            if !self.is_broken() {
                let goodbye = Text::from(OP_DISCONNECT);
                match session.exchange(&goodbye, CallStyle::FireAndForget, &[]) {
                    Ok(_) => std::thread::sleep(DISCONNECT_GRACE),
                    Err(err) => debug!(peer = %self.peer, error = %err, "disconnect notice failed"),
                }
            }
            if let Err(err) = session.port().get_ref().get_ref().shutdown() {
                debug!(peer = %self.peer, error = %err, "socket shutdown failed");
            }
        }
        debug!(peer = %self.peer, "disconnected");
        Ok(())
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Remote address, or the transport name when there is none.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn enter(&self) -> Result<GateGuard<'_, LinkSession>> {
        self.check_usable()?;
        let session = self.gate.acquire().inspect_err(|err| {
            if matches!(err, LinkError::Broken) {
                self.mark_broken(err);
            }
        })?;
        // a call that held the gate before us may have failed
        self.check_usable()?;
        Ok(session)
    }

    fn check_usable(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        if self.is_broken() {
            return Err(LinkError::Broken);
        }
        Ok(())
    }

    fn run(
        &self,
        session: &mut LinkSession,
        name: &Text,
        style: CallStyle,
        args: &[Value],
    ) -> Result<Vec<Value>> {
        let result = session.exchange(name, style, args);
        if let Err(err) = &result {
            if err.is_fatal() {
                self.mark_broken(err);
            }
        }
        result
    }

    fn select(&self, name: &str, values: Vec<Value>, selector: ResultSelector) -> Result<Vec<Value>> {
        selector.select(name, values).inspect_err(|err| self.mark_broken(err))
    }

    fn mark_broken(&self, err: &LinkError) {
        if !self.broken.swap(true, Ordering::SeqCst) {
            warn!(peer = %self.peer, error = %err, "connection marked broken");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("broken", &self.is_broken())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Exclusive hold on a [`Connection`] across several calls.
pub struct Batch<'a> {
    conn: &'a Connection,
    session: GateGuard<'a, LinkSession>,
}

impl Batch<'_> {
    pub fn call(&mut self, name: &str, style: CallStyle, args: &[Value]) -> Result<Vec<Value>> {
        self.conn.check_usable()?;
        self.conn
            .run(&mut self.session, &Text::from(name), style, args)
    }

    pub fn call_selected(
        &mut self,
        name: &str,
        args: &[Value],
        selector: ResultSelector,
    ) -> Result<Vec<Value>> {
        let values = self.call(name, CallStyle::TwoWay, args)?;
        self.conn.select(name, values, selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::connect_with_config;
    use crate::handshake::{send_greeting, Greeting};
    use crate::stub::{echo_handler, Reply, StubServer};
    use agdirect_transport::TcpEndpoint;
    use agdirect_wire::Operation;
    use std::sync::{Arc, Mutex};

    fn config_for(port: u16) -> LinkConfig {
        LinkConfig {
            poll_count: 1,
            timeout_ms: 1000,
            ..LinkConfig::new("127.0.0.1", port)
        }
    }

    fn echo_server() -> crate::stub::StubHandle {
        StubServer::bind("127.0.0.1:0", echo_handler)
            .expect("stub should bind")
            .spawn()
    }

    #[test]
    fn echo_round_trip() {
        let server = echo_server();
        let conn = connect_with_config(&config_for(server.port())).unwrap();
        let values = conn
            .call(
                "echo",
                CallStyle::TwoWay,
                &[Value::Integer(42), Value::from("hi")],
            )
            .unwrap();
        assert_eq!(values, vec![Value::Integer(42), Value::from("hi")]);
        conn.disconnect().unwrap();
    }

    #[test]
    fn application_error_keeps_connection_usable() {
        let server = StubServer::bind("127.0.0.1:0", |op: &Operation| {
            if op.name == "fail" {
                Reply::Error(vec![Value::from("bad state")])
            } else {
                Reply::Values(op.values.clone())
            }
        })
        .unwrap()
        .spawn();
        let conn = connect_with_config(&config_for(server.port())).unwrap();

        let err = conn.call("fail", CallStyle::TwoWay, &[]).unwrap_err();
        match &err {
            LinkError::Application(app) => assert_eq!(app.message, "bad state"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!err.is_fatal());
        assert!(!conn.is_broken());
        assert_eq!(
            conn.call_one("echo", &[Value::Integer(1)]).unwrap(),
            Value::Integer(1)
        );
    }

    #[test]
    fn sequential_calls_stay_correlated() {
        let server = echo_server();
        let conn = connect_with_config(&config_for(server.port())).unwrap();
        for i in 0..100i64 {
            let value = conn.call_one("echo", &[Value::Integer(i)]).unwrap();
            assert_eq!(value, Value::Integer(i));
        }
    }

    #[test]
    fn concurrent_callers_never_interleave() {
        const WORKERS: i64 = 8;
        const CALLS: i64 = 50;

        let arrivals: Arc<Mutex<Vec<Operation>>> = Arc::default();
        let recorded = Arc::clone(&arrivals);
        let server = StubServer::bind("127.0.0.1:0", move |op: &Operation| {
            recorded.lock().unwrap().push(op.clone());
            Reply::Values(op.values.clone())
        })
        .unwrap()
        .spawn();
        let conn = Arc::new(connect_with_config(&config_for(server.port())).unwrap());

        // payloads larger than the port buffer take several socket writes
        let payload = |worker: i64| format!("{worker}:{}", "abcdefgh".repeat(400));
        let workers: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let conn = Arc::clone(&conn);
                std::thread::spawn(move || {
                    for i in 0..CALLS {
                        let args = [
                            Value::Integer(worker),
                            Value::Integer(i),
                            Value::from(payload(worker).as_str()),
                        ];
                        let values = conn.call("echo", CallStyle::TwoWay, &args).unwrap();
                        assert_eq!(values, args);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert!(!conn.is_broken());

        let arrivals = arrivals.lock().unwrap();
        assert_eq!(arrivals.len() as i64, WORKERS * CALLS);
        let mut next_call = vec![0i64; WORKERS as usize];
        for (position, op) in arrivals.iter().enumerate() {
            // numbers are taken under the gate, so arrival order is call order
            assert_eq!(op.number, position as i64 + 1);
            assert_eq!(op.name, "echo");
            let [Value::Integer(worker), Value::Integer(i), Value::Text(text)] = op.values.as_slice()
            else {
                panic!("frame {} arrived mangled: {:?}", op.number, op.values);
            };
            assert_eq!(text.to_string_lossy(), payload(*worker));
            assert_eq!(*i, next_call[*worker as usize], "worker {worker} out of order");
            next_call[*worker as usize] += 1;
        }
        assert!(next_call.iter().all(|&n| n == CALLS));
    }

    #[test]
    fn batch_blocks_reentrant_calls() {
        let server = echo_server();
        let conn = connect_with_config(&config_for(server.port())).unwrap();

        let mut batch = conn.batch().unwrap();
        assert_eq!(
            batch
                .call("echo", CallStyle::TwoWay, &[Value::Bool(true)])
                .unwrap(),
            vec![Value::Bool(true)]
        );
        let err = conn.call("echo", CallStyle::TwoWay, &[]).unwrap_err();
        assert!(matches!(err, LinkError::Reentrant));
        assert!(!conn.is_broken());
        drop(batch);

        assert!(conn.call("echo", CallStyle::TwoWay, &[]).is_ok());
    }

    #[test]
    fn fire_and_forget_and_discard_styles() {
        let server = echo_server();
        let conn = connect_with_config(&config_for(server.port())).unwrap();
        assert!(conn
            .call("echo", CallStyle::FireAndForget, &[Value::Integer(1)])
            .unwrap()
            .is_empty());
        assert!(conn
            .call("echo", CallStyle::TwoWayDiscardResult, &[Value::Integer(2)])
            .unwrap()
            .is_empty());
        // the stream is still in step
        assert_eq!(
            conn.call_one("echo", &[Value::Integer(3)]).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn selector_faults_break_the_connection() {
        let server = echo_server();
        let conn = connect_with_config(&config_for(server.port())).unwrap();
        let err = conn
            .call_selected("echo", &[Value::Null], ResultSelector::Nothing)
            .unwrap_err();
        assert!(matches!(err, LinkError::UnexpectedResults { received: 1, .. }));
        assert!(conn.is_broken());
        assert!(matches!(
            conn.call("echo", CallStyle::TwoWay, &[]),
            Err(LinkError::Broken)
        ));
    }

    #[test]
    fn verify_reports_server_level() {
        let server = echo_server();
        let conn = connect_with_config(&config_for(server.port())).unwrap();
        let info = conn.verify().unwrap();
        assert!(info.version.starts_with("AGDirect Version"));
        assert_eq!(info.server_level, Some(u32::from(AG_DIRECT_LEVEL)));
    }

    #[test]
    fn verify_failure_disconnects() {
        let server = StubServer::bind("127.0.0.1:0", |_op: &Operation| {
            Reply::Values(vec![Value::from("hello")])
        })
        .unwrap()
        .spawn();
        let conn = connect_with_config(&config_for(server.port())).unwrap();
        assert!(matches!(conn.verify(), Err(LinkError::VerifyFailed(_))));
        assert!(conn.is_closed());
        assert!(matches!(
            conn.call("echo", CallStyle::TwoWay, &[]),
            Err(LinkError::Closed)
        ));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let server = echo_server();
        let conn = connect_with_config(&config_for(server.port())).unwrap();
        conn.disconnect().unwrap();
        conn.disconnect().unwrap();
        assert!(conn.is_closed());
    }

    #[test]
    fn disconnect_succeeds_after_the_server_hung_up() {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0").unwrap();
        let port = endpoint.port();
        let server = std::thread::spawn(move || {
            let mut stream = endpoint.accept().unwrap();
            send_greeting(&mut stream, Greeting::Accept).unwrap();
        });
        let conn = connect_with_config(&config_for(port)).unwrap();
        server.join().unwrap();

        // goodbye and socket shutdown may both fail; neither reaches the caller
        conn.disconnect().unwrap();
        assert!(conn.is_closed());
        assert!(matches!(
            conn.call("echo", CallStyle::TwoWay, &[]),
            Err(LinkError::Closed)
        ));
    }
}
