use bytes::{BufMut, BytesMut};

use crate::error::Result;
use crate::reader::ValueReader;
use crate::sequence::put_sequence;
use crate::tags::*;
use crate::value::{Upi, Value};

/// Codec options shared by [`crate::ValueWriter`] and [`crate::ValueReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireConfig {
    /// Emit DUPLICATE / REPEAT markers inside sequences when they are shorter
    /// than the literal elements. Decoding always understands the markers.
    pub compress_sequences: bool,
    /// Log every top-level value at TRACE level.
    pub trace_values: bool,
}

/// Split `v` into its sign bit and magnitude `-(v + 1)` / `v`.
fn sign_and_magnitude(v: i64) -> (u8, u64) {
    if v < 0 {
        (TAG_SIGN_MASK, !v as u64)
    } else {
        (0, v as u64)
    }
}

/// Number of bytes [`put_integer`] writes for `v`.
pub fn integer_len(v: i64) -> usize {
    let (_, m) = sign_and_magnitude(v);
    let imm = u64::from(TAG_IMM_TOP);
    if m < imm {
        1
    } else if m - imm < 0x100 {
        2
    } else {
        1 + magnitude_width(m)
    }
}

/// Smallest `L` with `m < 256^L`.
fn magnitude_width(m: u64) -> usize {
    let bits = 64 - m.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Encode a plain integer.
///
/// Wire format:
/// ```text
/// |m| < 23          one tag byte: 0x80 | sign | m
/// m - 23 < 256      tag 0x80 | sign | 23, then (m - 23) as one byte
/// otherwise         tag 0x80 | sign | (23 + L - 1), then L little-endian bytes of m
/// ```
/// where `m = v` for `v >= 0` and `m = -(v + 1)` otherwise.
pub fn put_integer(dst: &mut BytesMut, v: i64) {
    let (sign, m) = sign_and_magnitude(v);
    let imm = u64::from(TAG_IMM_TOP);
    if m < imm {
        dst.put_u8(TAG_INT_START | sign | m as u8);
        return;
    }
    if m - imm < 0x100 {
        dst.put_u8(TAG_INT_START | sign | TAG_IMM_TOP);
        dst.put_u8((m - imm) as u8);
        return;
    }
    let width = magnitude_width(m);
    dst.put_u8(TAG_INT_START | sign | (TAG_IMM_TOP + width as u8 - 1));
    dst.put_slice(&m.to_le_bytes()[..width]);
}

/// Encode a length or count. Lengths are never negative.
pub fn put_length(dst: &mut BytesMut, len: usize) {
    put_integer(dst, len as i64);
}

/// Tag, sign byte, 2-byte little-endian exponent, 3-byte little-endian mantissa.
pub fn put_float(dst: &mut BytesMut, x: f32) {
    let bits = x.to_bits();
    let exponent = ((bits >> 23) & 0xFF) as u16;
    let mantissa = bits & 0x007F_FFFF;
    dst.put_u8(TAG_FLOAT);
    dst.put_u8((bits >> 31) as u8);
    dst.put_u16_le(exponent);
    dst.put_slice(&mantissa.to_le_bytes()[..3]);
}

/// Tag, sign byte, 2-byte little-endian exponent, 7-byte little-endian mantissa.
pub fn put_double(dst: &mut BytesMut, x: f64) {
    let bits = x.to_bits();
    let exponent = ((bits >> 52) & 0x7FF) as u16;
    let mantissa = bits & 0x000F_FFFF_FFFF_FFFF;
    dst.put_u8(TAG_DOUBLE);
    dst.put_u8((bits >> 63) as u8);
    dst.put_u16_le(exponent);
    dst.put_slice(&mantissa.to_le_bytes()[..7]);
}

/// Encode a string of UTF-16 code units.
///
/// Strings shorter than 32 units carry their length in the tag. Longer ones
/// use `LSTR len`, and runs of at least five equal units inside them collapse
/// to `FRAG run unit`.
pub fn put_text(dst: &mut BytesMut, units: &[u16]) {
    let len = units.len();
    if len < TAG_SSTR_MAX {
        dst.put_u8(TAG_SSTR_START + len as u8);
        for unit in units {
            put_integer(dst, i64::from(*unit));
        }
        return;
    }

    dst.put_u8(TAG_LSTR);
    put_length(dst, len);
    let mut i = 0;
    while i < len {
        let unit = units[i];
        let run = units[i..].iter().take_while(|u| **u == unit).count();
        if run >= TAG_FRAG_MIN {
            dst.put_u8(TAG_FRAG);
            put_length(dst, run);
            put_integer(dst, i64::from(unit));
        } else {
            for _ in 0..run {
                put_integer(dst, i64::from(unit));
            }
        }
        i += run;
    }
}

/// Encode a possibly-null string.
pub fn put_opt_text(dst: &mut BytesMut, units: Option<&[u16]>) {
    match units {
        Some(units) => put_text(dst, units),
        None => dst.put_u8(TAG_NULL),
    }
}

/// A wide UPI is its tag plus 12 raw bytes; a coded UPI is its integer.
pub fn put_upi(dst: &mut BytesMut, upi: &Upi) {
    match upi {
        Upi::Wide(bytes) => {
            dst.put_u8(TAG_UPI);
            dst.put_slice(bytes);
        }
        Upi::Code(code) => put_integer(dst, *code),
    }
}

pub fn put_bytes(dst: &mut BytesMut, bytes: &[u8]) {
    dst.put_u8(TAG_BYTES);
    put_length(dst, bytes.len());
    dst.put_slice(bytes);
}

/// Append the encoding of `value` to `dst`.
pub fn encode_value(value: &Value, config: &WireConfig, dst: &mut BytesMut) {
    match value {
        Value::Null => dst.put_u8(TAG_NULL),
        Value::Bool(true) => dst.put_u8(TAG_TRUE),
        Value::Bool(false) => dst.put_u8(TAG_FALSE),
        Value::Integer(v) => put_integer(dst, *v),
        Value::Byte(v) => {
            dst.put_u8(TAG_BYTE);
            put_integer(dst, i64::from(*v));
        }
        Value::Short(v) => {
            dst.put_u8(TAG_SHORT);
            put_integer(dst, i64::from(*v));
        }
        Value::Int(v) => {
            dst.put_u8(TAG_INT);
            put_integer(dst, i64::from(*v));
        }
        Value::Char(v) => {
            dst.put_u8(TAG_CHAR);
            put_integer(dst, i64::from(*v));
        }
        Value::Float(v) => put_float(dst, *v),
        Value::Double(v) => put_double(dst, *v),
        Value::Text(t) => put_text(dst, t.units()),
        Value::Bytes(b) => put_bytes(dst, b),
        Value::Upi(u) => put_upi(dst, u),
        Value::Sequence(s) => put_sequence(dst, s, config),
    }
}

/// Decode one value from the front of `src`, advancing it past the value.
///
/// Input that ends inside the value yields [`crate::WireError::ConnectionClosed`].
pub fn decode_value(src: &mut &[u8]) -> Result<Value> {
    ValueReader::new(src).read_value()
}
