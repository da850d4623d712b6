//! Sequence bodies and their DUPLICATE / REPEAT compression.
//!
//! ```text
//! SEQ len subtag element*
//! element := literal | DUP j | REP j n
//! ```
//! `DUP j` copies the element `j` positions back into the next slot;
//! `REP j n` copies it into the next `n` slots.

use std::io::Read;

use bytes::{BufMut, BytesMut};

use crate::codec::{
    encode_value, integer_len, put_double, put_float, put_integer, put_length, put_opt_text,
    put_upi, WireConfig,
};
use crate::error::{Result, WireError};
use crate::reader::{ValueReader, PREALLOC_LIMIT};
use crate::tags::*;
use crate::value::{ElementKind, Sequence, Text, Upi, Value};

/// How far back the encoder looks for a duplicate.
const DUP_WINDOW: usize = 32;

impl ElementKind {
    /// Subtag written after the sequence length.
    pub fn subtag(self) -> u8 {
        match self {
            ElementKind::Byte => TAG_BYTE,
            ElementKind::Short => TAG_SHORT,
            ElementKind::Int => TAG_INT,
            ElementKind::Long => TAG_LONG,
            ElementKind::Char => TAG_CHAR,
            ElementKind::Float => TAG_FLOAT,
            ElementKind::Double => TAG_DOUBLE,
            ElementKind::Bool => TAG_TRUE,
            ElementKind::Upi => TAG_UPI,
            ElementKind::Text => TAG_STRING,
            ElementKind::Object => TAG_OBJECT,
        }
    }

    /// Element kind named by a subtag. Any integer tag means `Long`, any
    /// string tag means `Text`, and unassigned marker tags mean `Object`.
    pub fn from_subtag(tag: u8) -> Result<Self> {
        if tag < TAG_START {
            return Err(WireError::UnexpectedTag {
                tag,
                context: "sequence subtag",
            });
        }
        if is_integer_tag(tag) {
            return Ok(ElementKind::Long);
        }
        if tag >= TAG_LSTR {
            return Ok(ElementKind::Text);
        }
        Ok(match tag {
            TAG_BYTE => ElementKind::Byte,
            TAG_SHORT => ElementKind::Short,
            TAG_INT => ElementKind::Int,
            TAG_CHAR => ElementKind::Char,
            TAG_FLOAT => ElementKind::Float,
            TAG_DOUBLE => ElementKind::Double,
            TAG_TRUE | TAG_FALSE => ElementKind::Bool,
            TAG_UPI => ElementKind::Upi,
            _ => ElementKind::Object,
        })
    }
}

/// One element type of a homogeneous sequence.
pub(crate) trait Element: Clone + Sized {
    fn put(&self, dst: &mut BytesMut, config: &WireConfig);

    /// Wire identity; floats compare by bit pattern.
    fn same(&self, other: &Self) -> bool;

    fn read<R: Read>(tag: u8, reader: &mut ValueReader<R>) -> Result<Self>;
}

macro_rules! integer_element {
    ($ty:ty, $kind:literal) => {
        impl Element for $ty {
            fn put(&self, dst: &mut BytesMut, _config: &WireConfig) {
                put_integer(dst, i64::from(*self));
            }

            fn same(&self, other: &Self) -> bool {
                self == other
            }

            fn read<R: Read>(tag: u8, reader: &mut ValueReader<R>) -> Result<Self> {
                let v = reader.integer_from_tag(tag)?;
                <$ty>::try_from(v).map_err(|_| WireError::IntegerOutOfRange {
                    value: i128::from(v),
                    kind: $kind,
                })
            }
        }
    };
}

integer_element!(i8, "byte");
integer_element!(i16, "short");
integer_element!(i32, "int");
integer_element!(i64, "long");
integer_element!(u16, "char");

impl Element for f32 {
    fn put(&self, dst: &mut BytesMut, _config: &WireConfig) {
        put_float(dst, *self);
    }

    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn read<R: Read>(tag: u8, reader: &mut ValueReader<R>) -> Result<Self> {
        if tag != TAG_FLOAT {
            return Err(WireError::UnexpectedTag {
                tag,
                context: "float element",
            });
        }
        reader.read_float_body()
    }
}

impl Element for f64 {
    fn put(&self, dst: &mut BytesMut, _config: &WireConfig) {
        put_double(dst, *self);
    }

    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn read<R: Read>(tag: u8, reader: &mut ValueReader<R>) -> Result<Self> {
        if tag != TAG_DOUBLE {
            return Err(WireError::UnexpectedTag {
                tag,
                context: "double element",
            });
        }
        reader.read_double_body()
    }
}

impl Element for bool {
    fn put(&self, dst: &mut BytesMut, _config: &WireConfig) {
        dst.put_u8(if *self { TAG_TRUE } else { TAG_FALSE });
    }

    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn read<R: Read>(tag: u8, _reader: &mut ValueReader<R>) -> Result<Self> {
        match tag {
            TAG_TRUE => Ok(true),
            TAG_FALSE => Ok(false),
            other => Err(WireError::UnexpectedTag {
                tag: other,
                context: "boolean element",
            }),
        }
    }
}

impl Element for Option<Upi> {
    fn put(&self, dst: &mut BytesMut, _config: &WireConfig) {
        match self {
            Some(upi) => put_upi(dst, upi),
            None => dst.put_u8(TAG_NULL),
        }
    }

    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn read<R: Read>(tag: u8, reader: &mut ValueReader<R>) -> Result<Self> {
        match tag {
            TAG_NULL => Ok(None),
            TAG_UPI => Ok(Some(Upi::Wide(reader.read_upi_body()?))),
            t if is_integer_tag(t) => Ok(Some(Upi::Code(reader.integer_from_tag(t)?))),
            other => Err(WireError::UnexpectedTag {
                tag: other,
                context: "UPI element",
            }),
        }
    }
}

impl Element for Option<Text> {
    fn put(&self, dst: &mut BytesMut, _config: &WireConfig) {
        put_opt_text(dst, self.as_ref().map(Text::units));
    }

    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn read<R: Read>(tag: u8, reader: &mut ValueReader<R>) -> Result<Self> {
        reader.read_text_with_tag(tag)
    }
}

impl Element for Value {
    fn put(&self, dst: &mut BytesMut, config: &WireConfig) {
        encode_value(self, config, dst);
    }

    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn read<R: Read>(tag: u8, reader: &mut ValueReader<R>) -> Result<Self> {
        reader.read_value_with_tag(tag)
    }
}

/// Append `SEQ len subtag` and the elements of `seq`.
pub fn put_sequence(dst: &mut BytesMut, seq: &Sequence, config: &WireConfig) {
    dst.put_u8(TAG_SEQ);
    put_length(dst, seq.len());
    dst.put_u8(seq.kind().subtag());
    match seq {
        Sequence::Byte(v) => put_elements(dst, v, config),
        Sequence::Short(v) => put_elements(dst, v, config),
        Sequence::Int(v) => put_elements(dst, v, config),
        Sequence::Long(v) => put_elements(dst, v, config),
        Sequence::Char(v) => put_elements(dst, v, config),
        Sequence::Float(v) => put_elements(dst, v, config),
        Sequence::Double(v) => put_elements(dst, v, config),
        Sequence::Bool(v) => put_elements(dst, v, config),
        Sequence::Upi(v) => put_elements(dst, v, config),
        Sequence::Text(v) => put_elements(dst, v, config),
        Sequence::Object(v) => put_elements(dst, v, config),
    }
}

/// Write elements, replacing them with markers only where that is strictly
/// shorter than the literal encoding.
fn put_elements<T: Element>(dst: &mut BytesMut, items: &[T], config: &WireConfig) {
    if !config.compress_sequences {
        for item in items {
            item.put(dst, config);
        }
        return;
    }

    let mut literal = BytesMut::new();
    let mut i = 0;
    while i < items.len() {
        literal.clear();
        items[i].put(&mut literal, config);

        if i > 0 {
            let previous = &items[i - 1];
            let run = items[i..].iter().take_while(|x| x.same(previous)).count();
            let marker = 1 + integer_len(1) + integer_len(run as i64);
            if run >= TAG_RUN_MIN && marker < literal.len() * run {
                dst.put_u8(TAG_REP);
                put_length(dst, 1);
                put_length(dst, run);
                i += run;
                continue;
            }
        }

        let back = (1..=i.min(DUP_WINDOW)).find(|back| items[i - back].same(&items[i]));
        if let Some(back) = back {
            if 1 + integer_len(back as i64) < literal.len() {
                dst.put_u8(TAG_DUP);
                put_length(dst, back);
                i += 1;
                continue;
            }
        }

        dst.put_slice(&literal);
        i += 1;
    }
}

/// Read `len subtag element*` after a consumed SEQ tag.
pub(crate) fn read_sequence_body<R: Read>(reader: &mut ValueReader<R>) -> Result<Sequence> {
    let len = reader.read_length("sequence")?;
    let subtag = reader.read_tag()?;
    Ok(match ElementKind::from_subtag(subtag)? {
        ElementKind::Byte => Sequence::Byte(read_elements(reader, len)?),
        ElementKind::Short => Sequence::Short(read_elements(reader, len)?),
        ElementKind::Int => Sequence::Int(read_elements(reader, len)?),
        ElementKind::Long => Sequence::Long(read_elements(reader, len)?),
        ElementKind::Char => Sequence::Char(read_elements(reader, len)?),
        ElementKind::Float => Sequence::Float(read_elements(reader, len)?),
        ElementKind::Double => Sequence::Double(read_elements(reader, len)?),
        ElementKind::Bool => Sequence::Bool(read_elements(reader, len)?),
        ElementKind::Upi => Sequence::Upi(read_elements(reader, len)?),
        ElementKind::Text => Sequence::Text(read_elements(reader, len)?),
        ElementKind::Object => Sequence::Object(read_elements(reader, len)?),
    })
}

fn back_reference<T>(items: &[T], offset: usize) -> Result<&T> {
    if offset == 0 || offset > items.len() {
        return Err(WireError::BadBackReference {
            offset,
            index: items.len(),
        });
    }
    Ok(&items[items.len() - offset])
}

fn read_elements<T: Element, R: Read>(reader: &mut ValueReader<R>, len: usize) -> Result<Vec<T>> {
    let mut items: Vec<T> = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    while items.len() < len {
        match reader.read_tag()? {
            TAG_DUP => {
                let offset = reader.read_length("duplicate offset")?;
                let item = back_reference(&items, offset)?.clone();
                items.push(item);
            }
            TAG_REP => {
                let offset = reader.read_length("repeat offset")?;
                let count = reader.read_length("repeat count")?;
                if count > len - items.len() {
                    return Err(WireError::RepeatOverrun {
                        count,
                        index: items.len(),
                        len,
                    });
                }
                let item = back_reference(&items, offset)?.clone();
                items.resize(items.len() + count, item);
            }
            tag => items.push(T::read(tag, reader)?),
        }
    }
    Ok(items)
}
