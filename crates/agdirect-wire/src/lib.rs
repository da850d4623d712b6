//! Binary value codec for the AGDirect protocol.
//!
//! Every value is a tag byte followed by a tag-specific body: variable-length
//! integers, IEEE floats split into sign, exponent and mantissa, UTF-16
//! strings with run-length fragments, UPIs, byte arrays, and typed sequences
//! with back-reference compression. Requests and responses are
//! [`Operation`] frames of such values.

pub mod codec;
pub mod error;
pub mod operation;
pub mod reader;
mod sequence;
pub mod tags;
pub mod value;
pub mod writer;

pub use codec::{decode_value, encode_value, WireConfig};
pub use error::{Result, WireError};
pub use operation::{decode_operation, encode_operation, encode_request, Operation};
pub use reader::ValueReader;
pub use value::{ElementKind, Sequence, Text, Upi, Value};
pub use writer::ValueWriter;
