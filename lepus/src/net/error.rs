use std::fmt;
use std::io;

use crate::frame;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// Peer closed the socket between frames.
    PeerShutdown,
    /// Peer closed the socket in the middle of a frame.
    Interrupted,
    /// A blocking read or write ran past its deadline.
    Timeout,
    Framing(frame::Error),
    #[cfg(feature = "tls")]
    Tls(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<frame::Error> for Error {
    fn from(err: frame::Error) -> Self {
        Self::Framing(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "network i/o error: {}", err),
            Error::PeerShutdown => f.write_str("peer closed the connection"),
            Error::Interrupted => f.write_str("peer closed the connection mid-frame"),
            Error::Timeout => f.write_str("network operation timed out"),
            Error::Framing(err) => write!(f, "framing error: {}", err),
            #[cfg(feature = "tls")]
            Error::Tls(err) => write!(f, "tls error: {}", err),
        }
    }
}

impl std::error::Error for Error {}
