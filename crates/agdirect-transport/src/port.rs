use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BytesMut};

/// Outbound buffer size. A write that would overflow it flushes first.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Buffered byte port beneath the codec.
///
/// Outbound bytes accumulate until [`Port::flush`] (or an implicit flush when
/// the buffer would overflow). Nothing is sent before that, so a request must
/// be flushed before waiting for its response. Inbound reads are served from
/// whatever the last socket read returned; a read of zero bytes is EOF.
pub struct Port<S> {
    inner: S,
    out: BytesMut,
    input: BytesMut,
    capacity: usize,
}

impl<S: Read + Write> Port<S> {
    /// Create a port with the default outbound buffer size.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    /// Create a port with an explicit outbound buffer size.
    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            out: BytesMut::with_capacity(capacity),
            input: BytesMut::new(),
            capacity,
        }
    }

    /// Read exactly one byte (blocking).
    pub fn read_u8(&mut self) -> std::io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    fn send_pending(&mut self) -> std::io::Result<()> {
        while !self.out.is_empty() {
            match self.inner.write(&self.out) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "connection closed while flushing",
                    ))
                }
                Ok(n) => self.out.advance(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

impl<S: Read + Write> Write for Port<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.out.len() + buf.len() > self.capacity {
            self.send_pending()?;
        }
        if buf.len() > self.capacity {
            self.inner.write_all(buf)?;
        } else {
            self.out.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.send_pending()?;
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl<S: Read + Write> Read for Port<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.input.is_empty() {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = loop {
                match self.inner.read(&mut chunk) {
                    Ok(n) => break n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                }
            };
            if read == 0 {
                return Ok(0);
            }
            self.input.extend_from_slice(&chunk[..read]);
        }
        let n = buf.len().min(self.input.len());
        buf[..n].copy_from_slice(&self.input[..n]);
        self.input.advance(n);
        Ok(n)
    }
}

impl<S> std::fmt::Debug for Port<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("pending", &self.out.len())
            .field("buffered_input", &self.input.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
