use serde::{ser::Serializer, Serialize};

use super::Frame;

/// One body frame's worth of message content. Raw octets on the wire,
/// with no length prefix of its own (the frame header carries the size).
#[derive(Debug)]
pub struct ContentBody {
    pub(crate) inner: Vec<u8>,
}

impl ContentBody {
    pub fn new(inner: Vec<u8>) -> Self {
        Self { inner }
    }

    pub(crate) fn into_frame(self) -> Frame {
        Frame::ContentBody(self)
    }
}

impl Serialize for ContentBody {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.inner)
    }
}
