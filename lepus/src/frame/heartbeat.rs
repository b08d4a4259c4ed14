use serde::Serialize;

use super::Frame;

/// A heartbeat frame has an empty payload and always travels on channel 0.
#[derive(Debug, Serialize, Default)]
pub struct HeartBeat;

impl HeartBeat {
    pub(crate) fn into_frame(self) -> Frame {
        Frame::HeartBeat(self)
    }
}
