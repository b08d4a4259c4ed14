use std::fmt;

use crate::net;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by connection and channel operations.
#[derive(Debug, Clone)]
pub enum Error {
    /// Malformed or oversized frame, or an unknown method (501/502 class).
    FrameSyntax(String),
    /// A frame that is illegal in the current state (505).
    UnexpectedFrame(String),
    /// The channel was closed, by the server or locally; the reply code
    /// and text carry the server's reason when there is one.
    ChannelClosed { reply_code: u16, reply_text: String },
    /// The connection was closed; every pending operation fails with the
    /// same cause.
    ConnectionClosed { reply_code: u16, reply_text: String },
    /// Socket or TLS failure; the connection is gone.
    Network(String),
    /// A blocking call ran past its deadline; the connection survives.
    Timeout,
    /// Invalid use of the API, nothing was sent on the wire.
    ChannelUse(String),
    /// Cross-thread plumbing failure inside the client.
    Internal(String),
}

impl From<net::Error> for Error {
    fn from(err: net::Error) -> Self {
        match err {
            net::Error::Timeout => Error::Timeout,
            net::Error::Framing(err) => Error::FrameSyntax(err.to_string()),
            other => Error::Network(other.to_string()),
        }
    }
}

impl From<lepus_serde::Error> for Error {
    fn from(err: lepus_serde::Error) -> Self {
        Error::FrameSyntax(err.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrameSyntax(msg) => write!(f, "frame syntax error: {}", msg),
            Error::UnexpectedFrame(msg) => write!(f, "unexpected frame: {}", msg),
            Error::ChannelClosed {
                reply_code,
                reply_text,
            } => write!(f, "channel closed, {}: {}", reply_code, reply_text),
            Error::ConnectionClosed {
                reply_code,
                reply_text,
            } => write!(f, "connection closed, {}: {}", reply_code, reply_text),
            Error::Network(msg) => write!(f, "network failure: {}", msg),
            Error::Timeout => f.write_str("operation timed out"),
            Error::ChannelUse(msg) => write!(f, "invalid use: {}", msg),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
