/// Errors that can occur while encoding or decoding wire values.
///
/// Every variant except [`WireError::Io`] on the write path means the byte
/// stream can no longer be trusted; the connection carrying it is unusable.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A tag byte that is not valid at this position.
    #[error("unexpected tag 0x{tag:02x} ({name}) while reading {context}", name = tag_label(.tag))]
    UnexpectedTag { tag: u8, context: &'static str },

    /// A decoded integer does not fit the kind it was read as.
    #[error("integer {value} out of range for {kind}")]
    IntegerOutOfRange { value: i128, kind: &'static str },

    /// A negative or oversized length prefix.
    #[error("invalid length {len} for {context}")]
    InvalidLength { len: i64, context: &'static str },

    /// A DUPLICATE or REPEAT marker pointing outside the decoded elements.
    #[error("back-reference {offset} at element {index} is out of bounds")]
    BadBackReference { offset: usize, index: usize },

    /// A REPEAT marker that would write past the declared sequence length.
    #[error("repeat of {count} at element {index} overruns sequence of {len}")]
    RepeatOverrun {
        count: usize,
        index: usize,
        len: usize,
    },

    /// A string fragment that is empty or runs past the declared length.
    #[error("fragment of {run} at unit {index} overruns string of {len}")]
    FragmentOverrun { run: usize, index: usize, len: usize },

    /// Sequences nested deeper than the reader allows.
    #[error("sequences nested deeper than {max} levels")]
    NestingTooDeep { max: usize },

    /// An operation frame without a name.
    #[error("operation frame has no name")]
    MissingOperationName,

    /// The stream ended inside a value.
    #[error("connection closed (incomplete value)")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing values.
    #[error("wire I/O error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for WireError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            WireError::ConnectionClosed
        } else {
            WireError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, WireError>;

fn tag_label(tag: &u8) -> &'static str {
    crate::tags::tag_name(*tag)
}
