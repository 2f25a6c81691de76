use thiserror::Error;

/// Error type shared across the BER codec, transport and server crates.
#[derive(Error, Debug)]
pub enum BerError {
    /// The decoder's offset is at the end of the buffer; there is no more
    /// data to decode at this level.
    #[error("end of data")]
    Eof,

    /// A tag, length or value claimed more bytes than the buffer holds.
    #[error("unexpected end of data: need {needed} more byte(s)")]
    UnexpectedEof { needed: usize },

    /// A long-form tag number overflowed 32 bits, or its continuation
    /// octets never terminated.
    #[error("invalid tag number: {0}")]
    InvalidTagNumber(String),

    /// A reserved length byte (0xFF), an indefinite length on a primitive,
    /// or a length-of-length of 5 or more octets.
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// The constructed-frame stack would exceed its bound (128).
    #[error("constructed nesting exceeds maximum depth")]
    MaxDepthExceeded,

    /// The indefinite-length end-of-contents look-ahead nested beyond its
    /// bound (128).
    #[error("indefinite-length look-ahead exceeds maximum nesting")]
    MaxNestedEocExceeded,

    /// `enter_constructed`/`leave_constructed` called out of sequence with
    /// `next` (a caller precondition violation, not a malformed-input
    /// error).
    #[error("decoder misuse: {0}")]
    DecoderMisuse(&'static str),

    /// `end_constructed` called without a matching `start_constructed`.
    #[error("encoder misuse: {0}")]
    EncoderMisuse(&'static str),

    /// A decoded primitive value did not match the shape required for its
    /// type (wrong length, out-of-range field, bad terminator, ...).
    #[error("invalid {type_name} encoding: {reason}")]
    InvalidValue {
        type_name: &'static str,
        reason: String,
    },

    /// The encoder's value arena (256 slots) is full.
    #[error("encoder capacity exceeded (maximum 256 values)")]
    CapacityExceeded,

    /// `serialize` was called while a `start_constructed` had no matching
    /// `end_constructed`.
    #[error("constructed value still open at serialize time")]
    ConstructedStillOpen,

    /// Configuration outside the bounds the server accepts (worker count,
    /// file size, file age, missing directories, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binding or listening on an address failed.
    #[error("bind failed for {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure (read, write, rename, ...).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the BER toolkit.
pub type BerResult<T> = Result<T, BerError>;
