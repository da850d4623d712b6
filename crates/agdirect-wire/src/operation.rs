use std::io::Read;

use bytes::{BufMut, BytesMut};

use crate::codec::{encode_value, put_integer, put_text, WireConfig};
use crate::error::{Result, WireError};
use crate::reader::{ValueReader, PREALLOC_LIMIT};
use crate::tags::{TAG_INT, TAG_OP};
use crate::value::{Text, Value};

/// One request or response frame.
///
/// Wire format:
/// ```text
/// OP name number count value{count}
/// ```
/// `number` and `count` are written as `INT integer` and accepted on read in
/// either sized or plain form.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: Text,
    /// Positive for a call awaiting a reply, 0 for one-way, negative for an
    /// error reply or a call whose results are discarded.
    pub number: i64,
    pub values: Vec<Value>,
}

impl Operation {
    pub fn new(name: impl Into<Text>, number: i64, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            number,
            values,
        }
    }
}

fn put_frame_integer(dst: &mut BytesMut, v: i64) {
    if i32::try_from(v).is_ok() {
        dst.put_u8(TAG_INT);
    }
    put_integer(dst, v);
}

/// Append a frame built from borrowed parts.
pub fn encode_request(
    name: &Text,
    number: i64,
    values: &[Value],
    config: &WireConfig,
    dst: &mut BytesMut,
) {
    dst.put_u8(TAG_OP);
    put_text(dst, name.units());
    put_frame_integer(dst, number);
    put_frame_integer(dst, values.len() as i64);
    for value in values {
        encode_value(value, config, dst);
    }
}

/// Append the encoding of `op` to `dst`.
pub fn encode_operation(op: &Operation, config: &WireConfig, dst: &mut BytesMut) {
    encode_request(&op.name, op.number, &op.values, config, dst);
}

/// Decode one frame from the front of `src`, advancing it past the frame.
pub fn decode_operation(src: &mut &[u8]) -> Result<Operation> {
    ValueReader::new(src).read_operation()
}

impl<R: Read> ValueReader<R> {
    /// Read one complete operation frame.
    pub fn read_operation(&mut self) -> Result<Operation> {
        let tag = self.read_tag()?;
        if tag != TAG_OP {
            return Err(WireError::UnexpectedTag {
                tag,
                context: "operation",
            });
        }
        let name = self.read_text()?.ok_or(WireError::MissingOperationName)?;
        let number = self.read_any_integer()?;
        let count = self.read_length("operation value count")?;
        let mut values = Vec::with_capacity(count.min(PREALLOC_LIMIT));
        for _ in 0..count {
            values.push(self.read_value()?);
        }
        Ok(Operation {
            name,
            number,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::*;

    fn encoded(op: &Operation) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_operation(op, &WireConfig::default(), &mut buf);
        buf.to_vec()
    }

    #[test]
    fn request_header_layout() {
        let op = Operation::new("echo", 1, vec![Value::from("hi")]);
        assert_eq!(
            encoded(&op),
            vec![
                TAG_OP, 0xE4, 0x97, 0x4E, 0x97, 0x4C, 0x97, 0x51, 0x97, 0x58, // "echo"
                TAG_INT, 0x81, // number
                TAG_INT, 0x81, // count
                0xE2, 0x97, 0x51, 0x97, 0x52, // "hi"
            ]
        );
    }

    #[test]
    fn one_way_and_discarding_numbers() {
        let bytes = encoded(&Operation::new("x", 0, vec![]));
        assert_eq!(&bytes[4..], &[TAG_INT, 0x80, TAG_INT, 0x80]);
        let bytes = encoded(&Operation::new("x", -7, vec![]));
        assert_eq!(&bytes[4..6], &[TAG_INT, 0xA6]);
    }

    #[test]
    fn frame_round_trips() {
        let op = Operation::new(
            "store",
            -42,
            vec![Value::Null, Value::Integer(1 << 40), Value::from("s")],
        );
        let bytes = encoded(&op);
        let mut src: &[u8] = &bytes;
        assert_eq!(decode_operation(&mut src).unwrap(), op);
        assert!(src.is_empty());
    }

    #[test]
    fn huge_numbers_fall_back_to_plain_integers() {
        let op = Operation::new("x", i64::from(i32::MAX) + 1, vec![]);
        let bytes = encoded(&op);
        assert_ne!(bytes[4], TAG_INT);
        let mut src: &[u8] = &bytes;
        assert_eq!(decode_operation(&mut src).unwrap(), op);
    }

    #[test]
    fn reads_plain_integer_header() {
        // OP "a" 3 1 true, with number and count unsized
        let bytes = [TAG_OP, 0xE1, 0x97, 0x4A, 0x83, 0x81, TAG_TRUE];
        let mut src: &[u8] = &bytes;
        let op = decode_operation(&mut src).unwrap();
        assert_eq!(op.name, "a");
        assert_eq!(op.number, 3);
        assert_eq!(op.values, vec![Value::Bool(true)]);
    }

    #[test]
    fn malformed_frames() {
        let mut src: &[u8] = &[0xE1, 0x97, 0x4A];
        assert!(matches!(
            decode_operation(&mut src),
            Err(WireError::UnexpectedTag { context: "operation", .. })
        ));

        let mut src: &[u8] = &[TAG_OP, TAG_NULL, 0x81, 0x80];
        assert!(matches!(
            decode_operation(&mut src),
            Err(WireError::MissingOperationName)
        ));

        let mut src: &[u8] = &[TAG_OP, 0xE0, 0x81];
        assert!(matches!(
            decode_operation(&mut src),
            Err(WireError::ConnectionClosed)
        ));

        let mut src: &[u8] = &[TAG_OP, 0xE0, 0x81, 0x81, TAG_OP];
        assert!(matches!(
            decode_operation(&mut src),
            Err(WireError::UnexpectedTag { tag: TAG_OP, .. })
        ));
    }
}
