use std::fmt;

/// Errors raised while encoding or decoding frames.
#[derive(Debug)]
pub enum Error {
    /// Frame end marker is not `0xCE`, or the frame type is unknown.
    Corrupted,
    /// Frame payload exceeds the negotiated `frame_max`.
    OversizedPayload(usize),
    /// `(class_id, method_id)` absent from the method registry.
    UnknownMethod(u16, u16),
    /// Heartbeat frames must have an empty payload.
    NonEmptyHeartbeat,
    Codec(lepus_serde::Error),
}

impl From<lepus_serde::Error> for Error {
    fn from(err: lepus_serde::Error) -> Self {
        Self::Codec(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Corrupted => f.write_str("corrupted frame"),
            Error::OversizedPayload(size) => {
                write!(f, "frame payload of {} bytes exceeds frame_max", size)
            }
            Error::UnknownMethod(class_id, method_id) => {
                write!(f, "unknown method (class {}, method {})", class_id, method_id)
            }
            Error::NonEmptyHeartbeat => f.write_str("heartbeat frame with non-empty payload"),
            Error::Codec(err) => write!(f, "codec error: {}", err),
        }
    }
}

impl std::error::Error for Error {}
