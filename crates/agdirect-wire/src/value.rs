use std::fmt;

use bytes::Bytes;

use crate::tags::UPI_WIDTH;

/// A string as carried on the wire: a sequence of UTF-16 code units.
///
/// Unpaired surrogates are legal and survive a round trip unchanged, so the
/// units are kept as-is rather than converted to a Rust `String`.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Text(Vec<u16>);

impl Text {
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    pub fn units(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode to a Rust string, replacing unpaired surrogates with U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }

    /// Decode to a Rust string, failing on unpaired surrogates.
    pub fn try_to_string(&self) -> Result<String, std::string::FromUtf16Error> {
        String::from_utf16(&self.0)
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        let mut units = self.0.iter();
        prefix.encode_utf16().all(|u| units.next() == Some(&u))
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Vec<u16>> for Text {
    fn from(units: Vec<u16>) -> Self {
        Self(units)
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for Text {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

/// A unique part identifier.
///
/// On the wire a UPI is either 12 raw bytes or, inside UPI sequences, a bare
/// integer code the server uses as shorthand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Upi {
    Wide([u8; UPI_WIDTH]),
    Code(i64),
}

impl Upi {
    pub fn from_bytes(bytes: [u8; UPI_WIDTH]) -> Self {
        Upi::Wide(bytes)
    }

    /// Parse 24 hex digits into a wide UPI.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != UPI_WIDTH * 2 || !s.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; UPI_WIDTH];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Upi::Wide(bytes))
    }
}

impl fmt::Display for Upi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upi::Wide(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Upi::Code(code) => write!(f, "upi#{code}"),
        }
    }
}

/// Element kind of a homogeneous sequence, as named by its subtag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
    Bool,
    Upi,
    Text,
    Object,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Byte => "byte",
            ElementKind::Short => "short",
            ElementKind::Int => "int",
            ElementKind::Long => "long",
            ElementKind::Char => "char",
            ElementKind::Float => "float",
            ElementKind::Double => "double",
            ElementKind::Bool => "bool",
            ElementKind::Upi => "upi",
            ElementKind::Text => "string",
            ElementKind::Object => "object",
        }
    }
}

/// A homogeneous (or, for `Object`, heterogeneous) ordered collection.
///
/// The kind of an empty sequence is preserved.
#[derive(Debug, Clone)]
pub enum Sequence {
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Char(Vec<u16>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    /// `None` elements are null UPIs.
    Upi(Vec<Option<Upi>>),
    /// `None` elements are null strings.
    Text(Vec<Option<Text>>),
    Object(Vec<Value>),
}

impl Sequence {
    pub fn kind(&self) -> ElementKind {
        match self {
            Sequence::Byte(_) => ElementKind::Byte,
            Sequence::Short(_) => ElementKind::Short,
            Sequence::Int(_) => ElementKind::Int,
            Sequence::Long(_) => ElementKind::Long,
            Sequence::Char(_) => ElementKind::Char,
            Sequence::Float(_) => ElementKind::Float,
            Sequence::Double(_) => ElementKind::Double,
            Sequence::Bool(_) => ElementKind::Bool,
            Sequence::Upi(_) => ElementKind::Upi,
            Sequence::Text(_) => ElementKind::Text,
            Sequence::Object(_) => ElementKind::Object,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Sequence::Byte(v) => v.len(),
            Sequence::Short(v) => v.len(),
            Sequence::Int(v) => v.len(),
            Sequence::Long(v) => v.len(),
            Sequence::Char(v) => v.len(),
            Sequence::Float(v) => v.len(),
            Sequence::Double(v) => v.len(),
            Sequence::Bool(v) => v.len(),
            Sequence::Upi(v) => v.len(),
            Sequence::Text(v) => v.len(),
            Sequence::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements widened to values, for display and generic consumers.
    pub fn to_values(&self) -> Vec<Value> {
        match self {
            Sequence::Byte(v) => v.iter().map(|x| Value::Byte(*x)).collect(),
            Sequence::Short(v) => v.iter().map(|x| Value::Short(*x)).collect(),
            Sequence::Int(v) => v.iter().map(|x| Value::Int(*x)).collect(),
            Sequence::Long(v) => v.iter().map(|x| Value::Integer(*x)).collect(),
            Sequence::Char(v) => v.iter().map(|x| Value::Char(*x)).collect(),
            Sequence::Float(v) => v.iter().map(|x| Value::Float(*x)).collect(),
            Sequence::Double(v) => v.iter().map(|x| Value::Double(*x)).collect(),
            Sequence::Bool(v) => v.iter().map(|x| Value::Bool(*x)).collect(),
            Sequence::Upi(v) => v
                .iter()
                .map(|x| x.map_or(Value::Null, Value::Upi))
                .collect(),
            Sequence::Text(v) => v
                .iter()
                .map(|x| x.clone().map_or(Value::Null, Value::Text))
                .collect(),
            Sequence::Object(v) => v.clone(),
        }
    }
}

fn same_f32(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn same_f64(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Floats compare by bit pattern, so NaN payloads and signed zeros count.
impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Sequence::Byte(a), Sequence::Byte(b)) => a == b,
            (Sequence::Short(a), Sequence::Short(b)) => a == b,
            (Sequence::Int(a), Sequence::Int(b)) => a == b,
            (Sequence::Long(a), Sequence::Long(b)) => a == b,
            (Sequence::Char(a), Sequence::Char(b)) => a == b,
            (Sequence::Float(a), Sequence::Float(b)) => same_f32(a, b),
            (Sequence::Double(a), Sequence::Double(b)) => same_f64(a, b),
            (Sequence::Bool(a), Sequence::Bool(b)) => a == b,
            (Sequence::Upi(a), Sequence::Upi(b)) => a == b,
            (Sequence::Text(a), Sequence::Text(b)) => a == b,
            (Sequence::Object(a), Sequence::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// A value that can cross the wire.
///
/// Equality is exact wire identity: the sized integer kinds are distinct from
/// each other and from [`Value::Integer`], and floats compare by bit pattern.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    /// Plain variable-length integer.
    Integer(i64),
    Byte(i8),
    Short(i16),
    Int(i32),
    /// One UTF-16 code unit.
    Char(u16),
    Float(f32),
    Double(f64),
    Text(Text),
    Bytes(Bytes),
    Upi(Upi),
    Sequence(Sequence),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Upi(a), Value::Upi(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Short name of the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Char(_) => "char",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Text(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Upi(_) => "upi",
            Value::Sequence(_) => "sequence",
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) => write!(f, "{c}"),
                None => write!(f, "\\u{{{v:04x}}}"),
            },
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(t) => write!(f, "{t}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Upi(u) => write!(f, "{u}"),
            Value::Sequence(s) => {
                f.write_str("[")?;
                for (i, v) in s.to_values().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Text::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Text::from(v))
    }
}

impl From<Text> for Value {
    fn from(v: Text) -> Self {
        Value::Text(v)
    }
}

impl From<Upi> for Value {
    fn from(v: Upi) -> Self {
        Value::Upi(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Sequence> for Value {
    fn from(v: Sequence) -> Self {
        Value::Sequence(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_keeps_unpaired_surrogates() {
        let text = Text::from_units(vec![0x0041, 0xD800, 0x0042]);
        assert_eq!(text.len(), 3);
        assert!(text.try_to_string().is_err());
        assert_eq!(text.to_string_lossy(), "A\u{FFFD}B");
    }

    #[test]
    fn text_compares_with_str() {
        let text = Text::from("héllo");
        assert_eq!(text, "héllo");
        assert!(text.starts_with("hé"));
        assert!(!text.starts_with("hello"));
        assert!(Text::from("ab").starts_with(""));
        assert!(!Text::from("ab").starts_with("abc"));
    }

    #[test]
    fn upi_hex_round_trip() {
        let upi = Upi::from_bytes([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 0xff]);
        let hex = upi.to_string();
        assert_eq!(hex, "000102030405060708090aff");
        assert_eq!(Upi::from_hex(&hex), Some(upi));
        assert_eq!(Upi::from_hex("00"), None);
        assert_eq!(Upi::Code(7).to_string(), "upi#7");
    }

    #[test]
    fn sized_kinds_are_distinct() {
        assert_ne!(Value::Integer(5), Value::Int(5));
        assert_ne!(Value::Byte(5), Value::Short(5));
        assert_eq!(Value::from(5i64), Value::Integer(5));
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_eq!(
            Sequence::Float(vec![f32::NAN, 1.5]),
            Sequence::Float(vec![f32::NAN, 1.5])
        );
    }

    #[test]
    fn empty_sequences_keep_their_kind() {
        assert_ne!(Sequence::Long(vec![]), Sequence::Int(vec![]));
        assert_eq!(Sequence::Text(vec![]).kind(), ElementKind::Text);
        assert!(Sequence::Bool(vec![]).is_empty());
    }

    #[test]
    fn display_renders_nested_values() {
        let value = Value::Sequence(Sequence::Object(vec![
            Value::from("a"),
            Value::Integer(-3),
            Value::Null,
            Value::Sequence(Sequence::Bool(vec![true])),
        ]));
        assert_eq!(value.to_string(), "[a, -3, null, [true]]");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
