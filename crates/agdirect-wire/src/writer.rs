use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_value, WireConfig};
use crate::error::{Result, WireError};
use crate::operation::{encode_request, Operation};
use crate::value::{Text, Value};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Encodes values and operation frames onto any `Write` stream.
///
/// Each value is encoded into a scratch buffer and handed to the stream in
/// one write. Nothing here flushes implicitly; call [`ValueWriter::flush`]
/// once a request is complete.
pub struct ValueWriter<W> {
    inner: W,
    buf: BytesMut,
    config: WireConfig,
}

impl<W: Write> ValueWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    pub fn with_config(inner: W, config: WireConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode one value.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        self.buf.clear();
        encode_value(value, &self.config, &mut self.buf);
        if self.config.trace_values {
            trace!(kind = value.kind_name(), value = %value, "encoded value");
        }
        self.send()
    }

    /// Encode an operation frame from borrowed parts.
    pub fn write_request(&mut self, name: &Text, number: i64, values: &[Value]) -> Result<()> {
        self.buf.clear();
        encode_request(name, number, values, &self.config, &mut self.buf);
        if self.config.trace_values {
            trace!(operation = %name, number, count = values.len(), "encoded operation");
            for value in values {
                trace!(kind = value.kind_name(), value = %value, "encoded value");
            }
        }
        self.send()
    }

    pub fn write_operation(&mut self, op: &Operation) -> Result<()> {
        self.write_request(&op.name, op.number, &op.values)
    }

    fn send(&mut self) -> Result<()> {
        self.inner.write_all(&self.buf).map_err(|err| match err.kind() {
            ErrorKind::WriteZero => WireError::ConnectionClosed,
            _ => WireError::Io(err),
        })
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(WireError::Io)
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
