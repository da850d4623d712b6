use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// How much of the protocol exchange is logged.
///
/// Levels are cumulative: `Values` also logs calls, `Bytes` logs everything.
/// Tracing only observes the exchange; the bytes on the wire are identical at
/// every level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    /// Nothing beyond connection lifecycle events.
    #[default]
    Off,
    /// One event per call and per result.
    Calls,
    /// One event per encoded or decoded value.
    Values,
    /// Hex dump of every raw socket read and write.
    Bytes,
}

impl TraceLevel {
    pub fn calls(self) -> bool {
        self >= TraceLevel::Calls
    }

    pub fn values(self) -> bool {
        self >= TraceLevel::Values
    }

    pub fn bytes(self) -> bool {
        self >= TraceLevel::Bytes
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TraceLevel::Off => "off",
            TraceLevel::Calls => "calls",
            TraceLevel::Values => "values",
            TraceLevel::Bytes => "bytes",
        }
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "0" => Ok(TraceLevel::Off),
            "calls" | "1" => Ok(TraceLevel::Calls),
            "values" | "2" | "3" => Ok(TraceLevel::Values),
            "bytes" | "5" => Ok(TraceLevel::Bytes),
            other => Err(format!("unknown trace level '{other}'")),
        }
    }
}

/// Lowercase hex rendering of a byte slice, space separated.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Logging decorator around a raw stream.
///
/// When enabled, every successful read and write is logged at TRACE level
/// with the bytes that actually crossed the socket. When disabled it is a
/// plain pass-through.
#[derive(Debug)]
pub struct Traced<S> {
    inner: S,
    enabled: bool,
}

impl<S> Traced<S> {
    /// Wrap `inner`, logging only if `level` includes raw bytes.
    pub fn new(inner: S, level: TraceLevel) -> Self {
        Self {
            inner,
            enabled: level.bytes(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: Read> Read for Traced<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if self.enabled {
            if n == 0 {
                trace!(direction = "in", "eof");
            } else {
                trace!(direction = "in", len = n, bytes = %Hex(&buf[..n]), "raw read");
            }
        }
        Ok(n)
    }
}

impl<S: Write> Write for Traced<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        if self.enabled {
            trace!(direction = "out", len = n, bytes = %Hex(&buf[..n]), "raw write");
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()?;
        if self.enabled {
            trace!(direction = "out", "flush");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn levels_are_cumulative() {
        assert!(!TraceLevel::Off.calls());
        assert!(TraceLevel::Calls.calls());
        assert!(!TraceLevel::Calls.values());
        assert!(TraceLevel::Values.calls() && TraceLevel::Values.values());
        assert!(TraceLevel::Bytes.bytes() && TraceLevel::Bytes.values());
    }

    #[test]
    fn parses_names_and_legacy_numbers() {
        assert_eq!("off".parse::<TraceLevel>().unwrap(), TraceLevel::Off);
        assert_eq!("Calls".parse::<TraceLevel>().unwrap(), TraceLevel::Calls);
        assert_eq!("3".parse::<TraceLevel>().unwrap(), TraceLevel::Values);
        assert_eq!("5".parse::<TraceLevel>().unwrap(), TraceLevel::Bytes);
        assert!("loud".parse::<TraceLevel>().is_err());
    }

    #[test]
    fn hex_formats_bytes() {
        assert_eq!(Hex(&[0x82, 0x00, 0xff]).to_string(), "82 00 ff");
        assert_eq!(Hex(&[]).to_string(), "");
    }

    #[test]
    fn traced_does_not_alter_bytes() {
        let mut quiet = Traced::new(Cursor::new(Vec::new()), TraceLevel::Off);
        let mut loud = Traced::new(Cursor::new(Vec::new()), TraceLevel::Bytes);
        assert!(!quiet.is_enabled());
        assert!(loud.is_enabled());

        quiet.write_all(&[0xce, 0xe4, 0x65]).unwrap();
        loud.write_all(&[0xce, 0xe4, 0x65]).unwrap();
        quiet.flush().unwrap();
        loud.flush().unwrap();

        assert_eq!(quiet.get_ref().get_ref(), loud.get_ref().get_ref());
    }

    #[test]
    fn traced_read_passes_through() {
        let mut traced = Traced::new(Cursor::new(vec![1u8, 2, 3]), TraceLevel::Bytes);
        let mut buf = [0u8; 3];
        traced.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(traced.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn display_matches_config_names() {
        assert_eq!(TraceLevel::Values.to_string(), "values");
        assert_eq!(TraceLevel::default(), TraceLevel::Off);
    }
}
