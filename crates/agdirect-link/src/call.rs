use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use agdirect_transport::Port;
use agdirect_wire::{Operation, Text, Value, ValueReader, ValueWriter, WireConfig};
use tracing::debug;

use crate::error::{ApplicationError, LinkError, Result};

/// Most arguments one call may carry.
pub const MAX_CALL_ARGS: usize = 16_000;

/// How a call is answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CallStyle {
    /// The server replies with results.
    #[default]
    TwoWay,
    /// The server sends nothing back; the call returns once the request is
    /// flushed.
    FireAndForget,
    /// The server replies and the reply is validated, but its values are
    /// dropped.
    TwoWayDiscardResult,
}

impl CallStyle {
    /// The number written into the request for a call allocated `number`.
    pub fn wire_number(self, number: i64) -> i64 {
        match self {
            CallStyle::TwoWay => number,
            CallStyle::FireAndForget => 0,
            CallStyle::TwoWayDiscardResult => -number,
        }
    }

    pub fn expects_reply(self) -> bool {
        self != CallStyle::FireAndForget
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStyle::TwoWay => "two-way",
            CallStyle::FireAndForget => "oneway",
            CallStyle::TwoWayDiscardResult => "discard",
        }
    }
}

impl fmt::Display for CallStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "two-way" | "twoway" => Ok(CallStyle::TwoWay),
            "oneway" | "one-way" | "fire-and-forget" => Ok(CallStyle::FireAndForget),
            "discard" => Ok(CallStyle::TwoWayDiscardResult),
            other => Err(format!("unknown call style '{other}'")),
        }
    }
}

/// Which part of a reply the caller wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultSelector {
    /// Every value, in order.
    #[default]
    All,
    /// Exactly zero values.
    Nothing,
    /// The value at this index; later values are dropped.
    Index(usize),
}

impl ResultSelector {
    pub fn select(self, operation: &str, mut values: Vec<Value>) -> Result<Vec<Value>> {
        match self {
            ResultSelector::All => Ok(values),
            ResultSelector::Nothing if values.is_empty() => Ok(values),
            ResultSelector::Nothing => Err(LinkError::UnexpectedResults {
                operation: operation.to_string(),
                received: values.len(),
            }),
            ResultSelector::Index(i) if i < values.len() => Ok(vec![values.swap_remove(i)]),
            ResultSelector::Index(i) => Err(LinkError::MissingResult {
                operation: operation.to_string(),
                expected: i + 1,
                received: values.len(),
            }),
        }
    }
}

/// Check a reply against the request it answers and return its values.
///
/// In order: the echoed name must match, the magnitude of the echoed number
/// must match, and a negative number is an application error.
pub fn validate_reply(name: &Text, number: i64, reply: Operation) -> Result<Vec<Value>> {
    if reply.name != *name {
        return Err(LinkError::OperationMismatch {
            expected: name.to_string_lossy(),
            actual: reply.name.to_string_lossy(),
        });
    }
    if reply.number.unsigned_abs() != number.unsigned_abs() {
        return Err(LinkError::SequenceMismatch {
            operation: name.to_string_lossy(),
            expected: number,
            actual: reply.number,
        });
    }
    if reply.number < 0 {
        let operation = name.to_string_lossy();
        return Err(ApplicationError::from_values(&operation, number, &reply.values).into());
    }
    Ok(reply.values)
}

/// The state behind the gate: the buffered port and the call counter.
pub(crate) struct Session<S> {
    port: Port<S>,
    wire: WireConfig,
    trace_calls: bool,
    next_number: i64,
}

impl<S: Read + Write> Session<S> {
    pub(crate) fn new(port: Port<S>, wire: WireConfig, trace_calls: bool) -> Self {
        Self {
            port,
            wire,
            trace_calls,
            next_number: 1,
        }
    }

    /// Next call number, positive and within `i32` so it fits the sized form.
    fn allocate(&mut self) -> i64 {
        let number = self.next_number;
        self.next_number = if number >= i64::from(i32::MAX) {
            1
        } else {
            number + 1
        };
        number
    }

    /// Write one request, flush it, and read and validate the reply.
    pub(crate) fn exchange(
        &mut self,
        name: &Text,
        style: CallStyle,
        args: &[Value],
    ) -> Result<Vec<Value>> {
        if args.len() > MAX_CALL_ARGS {
            return Err(LinkError::TooManyArguments {
                count: args.len(),
                max: MAX_CALL_ARGS,
            });
        }
        let number = self.allocate();
        if self.trace_calls {
            debug!(operation = %name, number, style = %style, args = args.len(), "call");
        }

        let mut writer = ValueWriter::with_config(&mut self.port, self.wire);
        writer.write_request(name, style.wire_number(number), args)?;
        writer.flush()?;
        if !style.expects_reply() {
            return Ok(Vec::new());
        }

        let reply = ValueReader::with_config(&mut self.port, self.wire).read_operation()?;
        let values = validate_reply(name, number, reply)?;
        if self.trace_calls {
            debug!(operation = %name, number, results = values.len(), "reply");
        }
        match style {
            CallStyle::TwoWayDiscardResult => Ok(Vec::new()),
            _ => Ok(values),
        }
    }

    pub(crate) fn port(&self) -> &Port<S> {
        &self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agdirect_wire::{decode_operation, encode_operation};
    use bytes::BytesMut;
    use std::io::Cursor;

    /// In-memory duplex: reads from a canned reply, records writes.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session_replying(replies: &[Operation]) -> Session<Duplex> {
        let mut input = BytesMut::new();
        for reply in replies {
            encode_operation(reply, &WireConfig::default(), &mut input);
        }
        let duplex = Duplex {
            input: Cursor::new(input.to_vec()),
            output: Vec::new(),
        };
        Session::new(Port::new(duplex), WireConfig::default(), false)
    }

    fn sent(session: Session<Duplex>) -> Vec<Operation> {
        let mut src: &[u8] = &session.port().get_ref().output;
        let mut ops = Vec::new();
        while !src.is_empty() {
            ops.push(decode_operation(&mut src).unwrap());
        }
        ops
    }

    #[test]
    fn two_way_returns_values() {
        let mut session = session_replying(&[Operation::new(
            "echo",
            1,
            vec![Value::Integer(42), Value::from("hi")],
        )]);
        let values = session
            .exchange(
                &Text::from("echo"),
                CallStyle::TwoWay,
                &[Value::Integer(42), Value::from("hi")],
            )
            .unwrap();
        assert_eq!(values, vec![Value::Integer(42), Value::from("hi")]);

        let requests = sent(session);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].number, 1);
        assert_eq!(requests[0].values.len(), 2);
    }

    #[test]
    fn numbers_increase_per_call() {
        let replies: Vec<_> = (1..=3).map(|n| Operation::new("n", n, vec![])).collect();
        let mut session = session_replying(&replies);
        for _ in 0..3 {
            session
                .exchange(&Text::from("n"), CallStyle::TwoWay, &[])
                .unwrap();
        }
        let numbers: Vec<_> = sent(session).iter().map(|op| op.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn fire_and_forget_reads_nothing() {
        let mut session = session_replying(&[]);
        let values = session
            .exchange(&Text::from("note"), CallStyle::FireAndForget, &[Value::Null])
            .unwrap();
        assert!(values.is_empty());
        assert_eq!(sent(session)[0].number, 0);
    }

    #[test]
    fn discard_result_validates_but_drops_values() {
        let mut session = session_replying(&[Operation::new("d", 1, vec![Value::Integer(1)])]);
        let values = session
            .exchange(&Text::from("d"), CallStyle::TwoWayDiscardResult, &[])
            .unwrap();
        assert!(values.is_empty());
        assert_eq!(sent(session)[0].number, -1);
    }

    #[test]
    fn negative_reply_is_application_error() {
        let mut session = session_replying(&[
            Operation::new("op", -1, vec![Value::from("bad state")]),
            Operation::new("op", 2, vec![Value::Bool(true)]),
        ]);
        let err = session
            .exchange(&Text::from("op"), CallStyle::TwoWay, &[])
            .unwrap_err();
        match err {
            LinkError::Application(app) => {
                assert_eq!(app.message, "bad state");
                assert_eq!(app.number, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let values = session
            .exchange(&Text::from("op"), CallStyle::TwoWay, &[])
            .unwrap();
        assert_eq!(values, vec![Value::Bool(true)]);
    }

    #[test]
    fn mismatched_name_and_number_are_faults() {
        let mut session = session_replying(&[Operation::new("other", 1, vec![])]);
        let err = session
            .exchange(&Text::from("op"), CallStyle::TwoWay, &[])
            .unwrap_err();
        assert!(matches!(err, LinkError::OperationMismatch { .. }));
        assert!(err.is_fatal());

        let mut session = session_replying(&[Operation::new("op", 7, vec![])]);
        let err = session
            .exchange(&Text::from("op"), CallStyle::TwoWay, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::SequenceMismatch {
                expected: 1,
                actual: 7,
                ..
            }
        ));
    }

    #[test]
    fn name_is_checked_before_error_sign() {
        let mut session = session_replying(&[Operation::new("other", -1, vec![])]);
        let err = session
            .exchange(&Text::from("op"), CallStyle::TwoWay, &[])
            .unwrap_err();
        assert!(matches!(err, LinkError::OperationMismatch { .. }));
    }

    #[test]
    fn too_many_arguments_never_reach_the_wire() {
        let mut session = session_replying(&[]);
        let args = vec![Value::Null; MAX_CALL_ARGS + 1];
        let err = session
            .exchange(&Text::from("big"), CallStyle::TwoWay, &args)
            .unwrap_err();
        assert!(matches!(err, LinkError::TooManyArguments { .. }));
        assert!(!err.is_fatal());
        assert!(sent(session).is_empty());
    }

    #[test]
    fn truncated_reply_is_a_wire_fault() {
        let mut session = session_replying(&[]);
        let err = session
            .exchange(&Text::from("op"), CallStyle::TwoWay, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Wire(agdirect_wire::WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn selectors() {
        let values = vec![Value::Integer(1), Value::Integer(2)];
        assert_eq!(
            ResultSelector::All.select("x", values.clone()).unwrap(),
            values
        );
        assert_eq!(
            ResultSelector::Index(1).select("x", values.clone()).unwrap(),
            vec![Value::Integer(2)]
        );
        assert!(matches!(
            ResultSelector::Index(2).select("x", values.clone()),
            Err(LinkError::MissingResult {
                expected: 3,
                received: 2,
                ..
            })
        ));
        assert!(matches!(
            ResultSelector::Nothing.select("x", values),
            Err(LinkError::UnexpectedResults { received: 2, .. })
        ));
        assert!(ResultSelector::Nothing.select("x", vec![]).unwrap().is_empty());
    }

    #[test]
    fn call_style_names() {
        assert_eq!("oneway".parse::<CallStyle>().unwrap(), CallStyle::FireAndForget);
        assert_eq!("discard".parse::<CallStyle>().unwrap(), CallStyle::TwoWayDiscardResult);
        assert_eq!(CallStyle::TwoWay.to_string(), "two-way");
        assert!("both".parse::<CallStyle>().is_err());
        assert_eq!(CallStyle::TwoWayDiscardResult.wire_number(5), -5);
    }
}
