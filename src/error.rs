use std::{fmt, io};

use serde::{de, ser};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Not enough bytes were present to satisfy a declared size.
    Truncated,
    /// The input broke the value grammar.
    ProtocolViolation,
    /// A chunk larger than the format allows was handed to the header encoder.
    Overflow,
    /// The underlying byte sink or source failed.
    Io,
    /// A decoding limit, such as the nesting depth, was hit.
    ParseLimit,
    /// Conversion between Rust data and values failed.
    Serde,
}

#[derive(Debug)]
pub enum Error {
    /// Data ended too early. `actual` is what was available at `step`, `expected` is what the
    /// encoding declared.
    Truncated {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// A continuation chunk or map key didn't match the grammar, or a header wasn't minimal when
    /// minimal headers were required. Corrupt or adversarial data; the stream should be dropped.
    ProtocolViolation(String),
    /// Attempted to write a chunk header for more than the per-chunk maximum.
    Overflow { max: usize, actual: usize },
    /// I/O failure from the writer or reader, passed through as-is.
    Io(io::Error),
    /// Hit some parsing limit.
    ParseLimit(String),
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Error::Truncated { .. } => ErrorKind::Truncated,
            Error::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::Io(_) => ErrorKind::Io,
            Error::ParseLimit(_) => ErrorKind::ParseLimit,
            Error::SerdeFail(_) => ErrorKind::Serde,
        }
    }

    /// Whether retrying from the start of the incomplete value with more input could succeed.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Truncated
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Truncated {
                step,
                actual,
                expected,
            } => write!(
                f,
                "Expected data length {}, but got {} on step [{}]",
                expected, actual, step
            ),
            Error::ProtocolViolation(ref err) => write!(f, "Protocol violation: {}", err),
            Error::Overflow { max, actual } => write!(
                f,
                "Chunk too long: was {}, maximum allowed is {}",
                actual, max
            ),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}
