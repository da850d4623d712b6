use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use agdirect_transport::LinkStream;
use agdirect_wire::tags::{AG_DIRECT_LEVEL, TAG_ENDER, TAG_NULL, TAG_START};
use agdirect_wire::WireError;
use tracing::debug;

use crate::error::{LinkError, Result};

/// The server's first byte on an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    /// Ready, speaking protocol level [`AG_DIRECT_LEVEL`].
    Accept,
    /// No free connection slot.
    TooManyConnections,
    /// Connection refused.
    Reject,
}

impl Greeting {
    pub fn byte(self) -> u8 {
        match self {
            Greeting::Accept => TAG_START + AG_DIRECT_LEVEL,
            Greeting::TooManyConnections => TAG_ENDER,
            Greeting::Reject => TAG_NULL,
        }
    }

    /// Interpret a greeting byte on the client side.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b if b == TAG_START + AG_DIRECT_LEVEL => Ok(Greeting::Accept),
            TAG_ENDER => Ok(Greeting::TooManyConnections),
            TAG_NULL => Ok(Greeting::Reject),
            other => Err(LinkError::UnexpectedGreeting(other)),
        }
    }
}

/// Send a greeting (server side).
pub fn send_greeting<W: Write>(writer: &mut W, greeting: Greeting) -> Result<()> {
    writer
        .write_all(&[greeting.byte()])
        .and_then(|()| writer.flush())
        .map_err(WireError::from)?;
    Ok(())
}

/// Read the greeting from `reader` and accept only [`Greeting::Accept`].
pub fn expect_greeting<R: Read>(reader: &mut R, timeout: Option<Duration>) -> Result<()> {
    let mut byte = [0u8; 1];
    if let Err(err) = reader.read_exact(&mut byte) {
        return Err(match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                LinkError::GreetingTimeout(timeout.unwrap_or_default())
            }
            _ => WireError::from(err).into(),
        });
    }
    match Greeting::from_byte(byte[0])? {
        Greeting::Accept => Ok(()),
        Greeting::TooManyConnections => Err(LinkError::TooManyConnections),
        Greeting::Reject => Err(LinkError::Rejected),
    }
}

/// Client side of connection establishment on a fresh stream.
///
/// Waits up to `timeout` for the greeting, then clears the read timeout so
/// later calls block without limit. On failure the stream is shut down.
pub fn client_handshake(stream: &mut LinkStream, timeout: Option<Duration>) -> Result<()> {
    match greet(stream, timeout) {
        Ok(()) => {
            debug!(peer = stream.peer_addr().as_deref().unwrap_or("?"), "greeting accepted");
            Ok(())
        }
        Err(err) => {
            debug!(error = %err, "handshake failed");
            if let Err(err) = stream.shutdown() {
                debug!(error = %err, "shutdown after failed handshake");
            }
            Err(err)
        }
    }
}

fn greet(stream: &mut LinkStream, timeout: Option<Duration>) -> Result<()> {
    stream.set_read_timeout(timeout)?;
    expect_greeting(stream, timeout)?;
    stream.set_read_timeout(None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_bytes() {
        assert_eq!(Greeting::Accept.byte(), 0x82);
        assert_eq!(Greeting::TooManyConnections.byte(), 0xCF);
        assert_eq!(Greeting::Reject.byte(), 0xC0);
        for g in [Greeting::Accept, Greeting::TooManyConnections, Greeting::Reject] {
            assert_eq!(Greeting::from_byte(g.byte()).unwrap(), g);
        }
    }

    #[test]
    fn classifies_each_greeting() {
        let mut ok: &[u8] = &[0x82];
        assert!(expect_greeting(&mut ok, None).is_ok());

        let mut full: &[u8] = &[TAG_ENDER];
        assert!(matches!(
            expect_greeting(&mut full, None),
            Err(LinkError::TooManyConnections)
        ));

        let mut rejected: &[u8] = &[TAG_NULL];
        assert!(matches!(
            expect_greeting(&mut rejected, None),
            Err(LinkError::Rejected)
        ));

        let mut other: &[u8] = &[0x81];
        assert!(matches!(
            expect_greeting(&mut other, None),
            Err(LinkError::UnexpectedGreeting(0x81))
        ));

        let mut closed: &[u8] = &[];
        assert!(matches!(
            expect_greeting(&mut closed, None),
            Err(LinkError::Wire(WireError::ConnectionClosed))
        ));
    }

    #[test]
    fn send_greeting_writes_one_byte() {
        let mut out = Vec::new();
        send_greeting(&mut out, Greeting::TooManyConnections).unwrap();
        assert_eq!(out, vec![TAG_ENDER]);
    }

    #[cfg(unix)]
    #[test]
    fn silent_server_times_out() {
        let (client, _server) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut stream = LinkStream::from_unix(client);
        let err = client_handshake(&mut stream, Some(Duration::from_millis(50))).unwrap_err();
        assert!(matches!(err, LinkError::GreetingTimeout(d) if d == Duration::from_millis(50)));
    }

    #[cfg(unix)]
    #[test]
    fn handshake_over_socket_pair() {
        let (client, mut server) = std::os::unix::net::UnixStream::pair().unwrap();
        send_greeting(&mut server, Greeting::Accept).unwrap();
        let mut stream = LinkStream::from_unix(client);
        client_handshake(&mut stream, Some(Duration::from_secs(1))).unwrap();
    }
}
