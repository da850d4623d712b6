use std::io::Read;

use bytes::Bytes;
use tracing::trace;

use crate::codec::WireConfig;
use crate::error::{Result, WireError};
use crate::sequence::read_sequence_body;
use crate::tags::*;
use crate::value::{Text, Upi, Value};

/// Upper bound on capacity reserved up front from a length prefix.
pub(crate) const PREALLOC_LIMIT: usize = 4096;

/// Deepest sequence nesting accepted on decode.
pub const MAX_NESTING: usize = 64;

/// Decodes values from any `Read` stream.
///
/// Reads are pulled byte by byte from the source, so the source should be
/// buffered (the transport `Port` is).
pub struct ValueReader<R> {
    inner: R,
    config: WireConfig,
    depth: usize,
}

fn narrow<T: TryFrom<i64>>(v: i64, kind: &'static str) -> Result<T> {
    T::try_from(v).map_err(|_| WireError::IntegerOutOfRange {
        value: i128::from(v),
        kind,
    })
}

impl<R: Read> ValueReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    pub fn with_config(inner: R, config: WireConfig) -> Self {
        Self {
            inner,
            config,
            depth: 0,
        }
    }

    /// Read the next tag byte (blocking).
    pub fn read_tag(&mut self) -> Result<u8> {
        let mut tag = [0u8; 1];
        self.inner.read_exact(&mut tag)?;
        Ok(tag[0])
    }

    /// Read one complete value.
    pub fn read_value(&mut self) -> Result<Value> {
        let tag = self.read_tag()?;
        let value = self.read_value_with_tag(tag)?;
        if self.config.trace_values {
            trace!(kind = value.kind_name(), value = %value, "decoded value");
        }
        Ok(value)
    }

    /// Read the rest of a value whose tag has already been consumed.
    pub fn read_value_with_tag(&mut self, tag: u8) -> Result<Value> {
        if is_integer_tag(tag) {
            return self.integer_from_tag(tag).map(Value::Integer);
        }
        if is_string_tag(tag) {
            return Ok(self.read_text_with_tag(tag)?.map_or(Value::Null, Value::Text));
        }
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_TRUE => Value::Bool(true),
            TAG_FALSE => Value::Bool(false),
            TAG_BYTE => Value::Byte(narrow(self.read_integer()?, "byte")?),
            TAG_SHORT => Value::Short(narrow(self.read_integer()?, "short")?),
            TAG_INT => Value::Int(narrow(self.read_integer()?, "int")?),
            TAG_CHAR => Value::Char(narrow(self.read_integer()?, "char")?),
            TAG_FLOAT => Value::Float(self.read_float_body()?),
            TAG_DOUBLE => Value::Double(self.read_double_body()?),
            TAG_UPI => Value::Upi(Upi::Wide(self.read_upi_body()?)),
            TAG_BYTES => Value::Bytes(self.read_bytes_body()?),
            TAG_SEQ => {
                if self.depth >= MAX_NESTING {
                    return Err(WireError::NestingTooDeep { max: MAX_NESTING });
                }
                self.depth += 1;
                let seq = read_sequence_body(self);
                self.depth -= 1;
                Value::Sequence(seq?)
            }
            other => {
                return Err(WireError::UnexpectedTag {
                    tag: other,
                    context: "value",
                })
            }
        };
        Ok(value)
    }

    /// Read a plain integer, tag included.
    pub fn read_integer(&mut self) -> Result<i64> {
        let tag = self.read_tag()?;
        self.integer_from_tag(tag)
    }

    /// Read an integer that may be plain or prefixed with BYTE, SHORT or INT.
    ///
    /// Operation frames carry their number and count in either form.
    pub fn read_any_integer(&mut self) -> Result<i64> {
        match self.read_tag()? {
            TAG_BYTE | TAG_SHORT | TAG_INT => self.read_integer(),
            tag => self.integer_from_tag(tag),
        }
    }

    /// Decode the integer introduced by `tag`.
    pub fn integer_from_tag(&mut self, tag: u8) -> Result<i64> {
        if !is_integer_tag(tag) {
            return Err(WireError::UnexpectedTag {
                tag,
                context: "integer",
            });
        }
        let negative = tag & TAG_SIGN_MASK != 0;
        let low = tag & TAG_INT_MASK;
        let magnitude = if low < TAG_IMM_TOP {
            u64::from(low)
        } else {
            let width = usize::from(low - TAG_IMM_TOP) + 1;
            if width > 8 {
                return Err(WireError::UnexpectedTag {
                    tag,
                    context: "integer",
                });
            }
            let mut buf = [0u8; 8];
            self.inner.read_exact(&mut buf[..width])?;
            let m = u64::from_le_bytes(buf);
            if width == 1 {
                m + u64::from(TAG_IMM_TOP)
            } else {
                m
            }
        };
        let Ok(m) = i64::try_from(magnitude) else {
            let value = i128::from(magnitude);
            return Err(WireError::IntegerOutOfRange {
                value: if negative { -value - 1 } else { value },
                kind: "i64",
            });
        };
        Ok(if negative { -m - 1 } else { m })
    }

    /// Read a non-negative integer used as a length or count.
    pub fn read_length(&mut self, context: &'static str) -> Result<usize> {
        let len = self.read_any_integer()?;
        usize::try_from(len).map_err(|_| WireError::InvalidLength { len, context })
    }

    /// Read a possibly-null string, tag included.
    pub fn read_text(&mut self) -> Result<Option<Text>> {
        let tag = self.read_tag()?;
        self.read_text_with_tag(tag)
    }

    /// Read the rest of a string whose tag has already been consumed.
    pub fn read_text_with_tag(&mut self, tag: u8) -> Result<Option<Text>> {
        let len = match tag {
            TAG_NULL => return Ok(None),
            TAG_LSTR => self.read_length("string")?,
            t if t >= TAG_SSTR_START => usize::from(t - TAG_SSTR_START),
            other => {
                return Err(WireError::UnexpectedTag {
                    tag: other,
                    context: "string",
                })
            }
        };

        let mut units = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        while units.len() < len {
            let next = self.read_tag()?;
            if next == TAG_FRAG {
                let run = self.read_length("fragment")?;
                let unit: u16 = narrow(self.read_integer()?, "char")?;
                if run == 0 || run > len - units.len() {
                    return Err(WireError::FragmentOverrun {
                        run,
                        index: units.len(),
                        len,
                    });
                }
                units.resize(units.len() + run, unit);
            } else {
                units.push(narrow(self.integer_from_tag(next)?, "char")?);
            }
        }
        Ok(Some(Text::from_units(units)))
    }

    pub(crate) fn read_float_body(&mut self) -> Result<f32> {
        let mut b = [0u8; 6];
        self.inner.read_exact(&mut b)?;
        let sign = u32::from(b[0] != 0) << 31;
        let exponent = (u32::from(u16::from_le_bytes([b[1], b[2]])) & 0xFF) << 23;
        let mantissa = u32::from_le_bytes([b[3], b[4], b[5], 0]) & 0x007F_FFFF;
        Ok(f32::from_bits(sign | exponent | mantissa))
    }

    pub(crate) fn read_double_body(&mut self) -> Result<f64> {
        let mut b = [0u8; 10];
        self.inner.read_exact(&mut b)?;
        let sign = u64::from(b[0] != 0) << 63;
        let exponent = (u64::from(u16::from_le_bytes([b[1], b[2]])) & 0x7FF) << 52;
        let mantissa = u64::from_le_bytes([b[3], b[4], b[5], b[6], b[7], b[8], b[9], 0])
            & 0x000F_FFFF_FFFF_FFFF;
        Ok(f64::from_bits(sign | exponent | mantissa))
    }

    pub(crate) fn read_upi_body(&mut self) -> Result<[u8; UPI_WIDTH]> {
        let mut bytes = [0u8; UPI_WIDTH];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_bytes_body(&mut self) -> Result<Bytes> {
        let len = self.read_length("byte array")?;
        let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(WireError::ConnectionClosed);
        }
        Ok(Bytes::from(buf))
    }
}
