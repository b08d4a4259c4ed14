use std::fmt::{self, Display};

use serde::{de, ser};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Message(String),
    /// Input ended before a complete value could be parsed.
    Eof,
    /// A length-prefixed value was parsed without a preceding length.
    ExpectedLength,
    /// The declared length exceeds the remaining input.
    Syntax,
    /// A string exceeds the limit of its length prefix.
    StrTooLong,
    /// Input remained after the value was fully parsed.
    TrailingBytes,
    /// Unknown field-table value tag.
    UnknownTag(u8),
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Message(msg) => f.write_str(msg),
            Error::Eof => f.write_str("unexpected end of input"),
            Error::ExpectedLength => f.write_str("length prefix missing"),
            Error::Syntax => f.write_str("declared length exceeds input"),
            Error::StrTooLong => f.write_str("string exceeds length prefix limit"),
            Error::TrailingBytes => f.write_str("trailing bytes after value"),
            Error::UnknownTag(tag) => write!(f, "unknown field value tag 0x{:02x}", tag),
        }
    }
}

impl std::error::Error for Error {}
