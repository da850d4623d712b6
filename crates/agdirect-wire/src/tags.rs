//! Tag bytes of the AGDirect wire format.
//!
//! Every value starts with one tag byte. Tags below [`TAG_START`] never occur.
//!
//! ```text
//! 0x80..0xBF  integers: bit 0x20 = sign, low 5 bits = immediate value (< 23)
//!             or 23 + (byte length - 1) of a little-endian magnitude
//! 0xC0..0xDF  fixed marker tags (null, sized numbers, sequences, operations, ...)
//! 0xDE        long string with explicit length
//! 0xE0..0xFF  short string, length = tag - 0xE0
//! ```

/// First tag value.
pub const TAG_START: u8 = 0x80;
/// First integer tag.
pub const TAG_INT_START: u8 = 0x80;
/// End (exclusive) of the integer tags.
pub const TAG_INT_END: u8 = 0xC0;
/// Magnitude / length bits of an integer tag.
pub const TAG_INT_MASK: u8 = 0x1F;
/// Sign bit of an integer tag.
pub const TAG_SIGN_MASK: u8 = 0x20;
/// Magnitudes below this are carried in the tag itself.
pub const TAG_IMM_TOP: u8 = 23;

pub const TAG_NULL: u8 = 0xC0;
pub const TAG_BYTE: u8 = 0xC1;
pub const TAG_SHORT: u8 = 0xC2;
pub const TAG_INT: u8 = 0xC3;
/// Element kind of a sequence of plain (64-bit) integers.
pub const TAG_LONG: u8 = 0x80;
pub const TAG_CHAR: u8 = 0xC4;
pub const TAG_FLOAT: u8 = 0xC5;
pub const TAG_DOUBLE: u8 = 0xC6;
pub const TAG_SEQ: u8 = 0xC8;
/// Reserved; never produced, rejected on decode.
pub const TAG_SPARSE: u8 = 0xC9;
/// Element kind of a heterogeneous sequence.
pub const TAG_OBJECT: u8 = 0xCA;
pub const TAG_TRUE: u8 = 0xCB;
pub const TAG_FALSE: u8 = 0xCC;
pub const TAG_OP: u8 = 0xCE;
/// Sent instead of a greeting when the server has no free connection slot.
pub const TAG_ENDER: u8 = 0xCF;
pub const TAG_BYTES: u8 = 0xD2;
pub const TAG_UPI: u8 = 0xD3;
/// Sequence marker: copy the element `j` positions back.
pub const TAG_DUP: u8 = 0xD4;
/// Sequence marker: copy the element `j` positions back into the next `n` slots.
pub const TAG_REP: u8 = 0xD5;
/// Long string: integer length follows.
pub const TAG_LSTR: u8 = 0xDE;
/// Element kind of a string sequence.
pub const TAG_STRING: u8 = 0xDE;
/// String fragment: run length and code unit follow.
pub const TAG_FRAG: u8 = 0xDF;
/// First short-string tag.
pub const TAG_SSTR_START: u8 = 0xE0;
/// Strings shorter than this are tagged with their length.
pub const TAG_SSTR_MAX: usize = 32;
/// Shortest run of one code unit written as a fragment.
pub const TAG_FRAG_MIN: usize = 5;
/// Shortest run of equal sequence elements written as a repeat.
pub const TAG_RUN_MIN: usize = 2;

/// Width of a UPI in bytes.
pub const UPI_WIDTH: usize = 12;
/// Protocol level announced in the greeting byte (`TAG_START + level`).
pub const AG_DIRECT_LEVEL: u8 = 2;

/// Whether `tag` introduces an integer.
pub fn is_integer_tag(tag: u8) -> bool {
    (TAG_INT_START..TAG_INT_END).contains(&tag)
}

/// Whether `tag` introduces a string (short or long).
pub fn is_string_tag(tag: u8) -> bool {
    tag == TAG_LSTR || tag >= TAG_SSTR_START
}

/// Human readable tag name for diagnostics.
pub fn tag_name(tag: u8) -> &'static str {
    if tag < TAG_START {
        return "NOT_A_TAG";
    }
    if is_integer_tag(tag) {
        return "INTEGER";
    }
    match tag {
        TAG_NULL => "NULL",
        TAG_BYTE => "BYTE",
        TAG_SHORT => "SHORT",
        TAG_INT => "INT",
        TAG_CHAR => "CHAR",
        TAG_FLOAT => "FLOAT",
        TAG_DOUBLE => "DOUBLE",
        TAG_SEQ => "SEQ",
        TAG_SPARSE => "SPARSE",
        TAG_OBJECT => "OBJECT",
        TAG_TRUE => "TRUE",
        TAG_FALSE => "FALSE",
        TAG_OP => "OP",
        TAG_ENDER => "ENDER",
        TAG_BYTES => "BYTES",
        TAG_UPI => "UPI",
        TAG_DUP => "DUP",
        TAG_REP => "REP",
        TAG_LSTR => "LSTR",
        TAG_FRAG => "FRAG",
        t if t >= TAG_SSTR_START => "SSTR",
        _ => "UNASSIGNED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_tag_range() {
        assert!(is_integer_tag(0x80));
        assert!(is_integer_tag(0xBF));
        assert!(!is_integer_tag(0xC0));
        assert!(!is_integer_tag(0x7F));
    }

    #[test]
    fn string_tag_range() {
        assert!(is_string_tag(TAG_LSTR));
        assert!(is_string_tag(TAG_SSTR_START));
        assert!(is_string_tag(0xFF));
        assert!(!is_string_tag(TAG_FRAG));
        assert_eq!(TAG_SSTR_START as usize + TAG_SSTR_MAX, 0x100);
    }

    #[test]
    fn names_for_diagnostics() {
        assert_eq!(tag_name(0x10), "NOT_A_TAG");
        assert_eq!(tag_name(0x95), "INTEGER");
        assert_eq!(tag_name(TAG_OP), "OP");
        assert_eq!(tag_name(0xE3), "SSTR");
        assert_eq!(tag_name(0xC7), "UNASSIGNED");
    }

    #[test]
    fn greeting_byte_for_current_level() {
        assert_eq!(TAG_START + AG_DIRECT_LEVEL, 0x82);
    }
}
