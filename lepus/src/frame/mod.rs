//! Frame types and the buffered frame decoder.
//!
//! Every protocol method is a plain struct; the [`Frame`] enum is the
//! closed union over all of them plus the heartbeat and content frames.
//! Serialization of a `Frame` yields the frame *payload* only; the frame
//! header and end marker are written by the frame writer, which also
//! patches the payload size once it is known.

use lepus_serde::constants::{
    FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEADER_SIZE, FRAME_HEARTBEAT, FRAME_METHOD,
};
use lepus_serde::from_bytes;
use lepus_serde::types::{AmqpChannelId, LongUint, Octect, ShortUint};
use serde::{Deserialize, Serialize};

mod content_body;
mod content_header;
mod error;
mod heartbeat;
mod method;
mod protocol_header;
pub mod registry;

pub use content_body::*;
pub use content_header::*;
pub use error::*;
pub use heartbeat::*;
pub use method::*;
pub use protocol_header::*;

/// Channel 0 carries connection-class methods and heartbeats only.
pub const CONN_DEFAULT_CHANNEL: AmqpChannelId = 0;

/// `frame type (1) + channel (2) + payload size (4)`.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct FrameHeader {
    pub frame_type: Octect,
    pub channel: ShortUint,
    pub payload_size: LongUint,
}

macro_rules! frames {
    ($( $name:ident = ($class:literal, $method:literal) ),+ $(,)?) => {
        /// A complete frame payload, typed by method.
        ///
        /// Method variants carry their method header so that serializing
        /// the variant emits `class id + method id + arguments` in one go.
        #[derive(Debug, Serialize)]
        #[serde(untagged)]
        pub enum Frame {
            $( $name(&'static MethodHeader, $name), )+
            HeartBeat(HeartBeat),
            ContentHeader(ContentHeader),
            ContentBody(ContentBody),
        }

        $(
            impl $name {
                pub(crate) fn header() -> &'static MethodHeader {
                    const HEADER: MethodHeader = MethodHeader::new($class, $method);
                    &HEADER
                }

                pub(crate) fn into_frame(self) -> Frame {
                    Frame::$name(Self::header(), self)
                }
            }
        )+

        impl Frame {
            /// The method header of a method frame, `None` for heartbeat
            /// and content frames.
            pub fn method_header(&self) -> Option<&'static MethodHeader> {
                match self {
                    $( Frame::$name(header, _) => Some(header), )+
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( Frame::$name(..) => stringify!($name), )+
                    Frame::HeartBeat(_) => "HeartBeat",
                    Frame::ContentHeader(_) => "ContentHeader",
                    Frame::ContentBody(_) => "ContentBody",
                }
            }

            fn decode_method(header: MethodHeader, content: &[u8]) -> Result<Frame, Error> {
                match (header.class_id(), header.method_id()) {
                    $( ($class, $method) => Ok(from_bytes::<$name>(content)?.into_frame()), )+
                    (class_id, method_id) => Err(Error::UnknownMethod(class_id, method_id)),
                }
            }
        }
    };
}

frames! {
    // connection, class 10
    Start = (10, 10),
    StartOk = (10, 11),
    Secure = (10, 20),
    SecureOk = (10, 21),
    Tune = (10, 30),
    TuneOk = (10, 31),
    Open = (10, 40),
    OpenOk = (10, 41),
    Close = (10, 50),
    CloseOk = (10, 51),
    Blocked = (10, 60),
    Unblocked = (10, 61),
    // channel, class 20
    OpenChannel = (20, 10),
    OpenChannelOk = (20, 11),
    Flow = (20, 20),
    FlowOk = (20, 21),
    CloseChannel = (20, 40),
    CloseChannelOk = (20, 41),
    // exchange, class 40
    Declare = (40, 10),
    DeclareOk = (40, 11),
    Delete = (40, 20),
    DeleteOk = (40, 21),
    Bind = (40, 30),
    BindOk = (40, 31),
    Unbind = (40, 40),
    UnbindOk = (40, 51),
    // queue, class 50
    DeclareQueue = (50, 10),
    DeclareQueueOk = (50, 11),
    BindQueue = (50, 20),
    BindQueueOk = (50, 21),
    PurgeQueue = (50, 30),
    PurgeQueueOk = (50, 31),
    DeleteQueue = (50, 40),
    DeleteQueueOk = (50, 41),
    UnbindQueue = (50, 50),
    UnbindQueueOk = (50, 51),
    // basic, class 60
    Qos = (60, 10),
    QosOk = (60, 11),
    Consume = (60, 20),
    ConsumeOk = (60, 21),
    Cancel = (60, 30),
    CancelOk = (60, 31),
    Publish = (60, 40),
    Return = (60, 50),
    Deliver = (60, 60),
    Get = (60, 70),
    GetOk = (60, 71),
    GetEmpty = (60, 72),
    Ack = (60, 80),
    Reject = (60, 90),
    RecoverAsync = (60, 100),
    Recover = (60, 110),
    RecoverOk = (60, 111),
    Nack = (60, 120),
    // confirm, class 85 (RabbitMQ extension)
    Select = (85, 10),
    SelectOk = (85, 11),
    // tx, class 90
    SelectTx = (90, 10),
    SelectTxOk = (90, 11),
    Commit = (90, 20),
    CommitOk = (90, 21),
    Rollback = (90, 30),
    RollbackOk = (90, 31),
}

impl Frame {
    pub fn get_frame_type(&self) -> Octect {
        match self {
            Frame::HeartBeat(_) => FRAME_HEARTBEAT,
            Frame::ContentHeader(_) => FRAME_HEADER,
            Frame::ContentBody(_) => FRAME_BODY,
            _ => FRAME_METHOD,
        }
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns `None` when `buf` does not yet hold a complete frame, and
    /// `(consumed bytes, channel id, frame)` once it does. `frame_max`
    /// bounds the payload size; `0` means unlimited.
    pub fn decode(
        buf: &[u8],
        frame_max: usize,
    ) -> Result<Option<(usize, AmqpChannelId, Frame)>, Error> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let FrameHeader {
            frame_type,
            channel,
            payload_size,
        } = from_bytes(&buf[..FRAME_HEADER_SIZE])?;
        let payload_size = payload_size as usize;
        if frame_max != 0 && payload_size > frame_max {
            return Err(Error::OversizedPayload(payload_size));
        }
        let total = FRAME_HEADER_SIZE + payload_size + 1;
        if buf.len() < total {
            return Ok(None);
        }
        if buf[total - 1] != FRAME_END {
            return Err(Error::Corrupted);
        }

        let payload = &buf[FRAME_HEADER_SIZE..total - 1];
        let frame = match frame_type {
            FRAME_METHOD => {
                if payload.len() < 4 {
                    return Err(Error::Codec(lepus_serde::Error::Eof));
                }
                let header: MethodHeader = from_bytes(&payload[..4])?;
                Self::decode_method(header, &payload[4..])?
            }
            FRAME_HEADER => from_bytes::<ContentHeader>(payload)?.into_frame(),
            FRAME_BODY => ContentBody::new(payload.to_vec()).into_frame(),
            FRAME_HEARTBEAT => {
                if !payload.is_empty() {
                    return Err(Error::NonEmptyHeartbeat);
                }
                HeartBeat.into_frame()
            }
            _ => return Err(Error::Corrupted),
        };
        Ok(Some((total, channel, frame)))
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use lepus_serde::to_bytes;

    use super::*;

    fn encode_frame(channel: AmqpChannelId, frame: &Frame) -> Vec<u8> {
        let payload = to_bytes(frame).unwrap();
        let mut out = to_bytes(&FrameHeader {
            frame_type: frame.get_frame_type(),
            channel,
            payload_size: payload.len() as u32,
        })
        .unwrap();
        out.extend_from_slice(&payload);
        out.push(FRAME_END);
        out
    }

    #[test]
    fn incomplete_input_yields_none() {
        let bytes = encode_frame(0, &HeartBeat.into_frame());
        for cut in 0..bytes.len() {
            assert!(Frame::decode(&bytes[..cut], 0).unwrap().is_none());
        }
    }

    #[test]
    fn bad_end_marker_is_corrupted() {
        let mut bytes = encode_frame(0, &HeartBeat.into_frame());
        *bytes.last_mut().unwrap() = 0xCD;
        assert!(matches!(Frame::decode(&bytes, 0), Err(Error::Corrupted)));
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let publish = Publish::new("e".try_into().unwrap(), "rk".try_into().unwrap());
        let bytes = encode_frame(1, &publish.into_frame());
        assert!(matches!(
            Frame::decode(&bytes, 4),
            Err(Error::OversizedPayload(_))
        ));
        // unlimited frame_max accepts it
        assert!(Frame::decode(&bytes, 0).unwrap().is_some());
    }

    #[test]
    fn unknown_method_is_rejected() {
        let mut payload = to_bytes(&MethodHeader::new(42, 42)).unwrap();
        payload.extend_from_slice(&[0, 0]);
        let mut bytes = to_bytes(&FrameHeader {
            frame_type: FRAME_METHOD,
            channel: 1,
            payload_size: payload.len() as u32,
        })
        .unwrap();
        bytes.extend_from_slice(&payload);
        bytes.push(FRAME_END);
        assert!(matches!(
            Frame::decode(&bytes, 0),
            Err(Error::UnknownMethod(42, 42))
        ));
    }

    #[test]
    fn method_frame_round_trip() {
        let mut declare = DeclareQueue::new("work".try_into().unwrap(), Default::default());
        declare.set_durable(true);
        let bytes = encode_frame(7, &declare.into_frame());

        let (consumed, channel, frame) = Frame::decode(&bytes, 0).unwrap().unwrap();
        assert_eq!(bytes.len(), consumed);
        assert_eq!(7, channel);
        match frame {
            Frame::DeclareQueue(header, _) => assert_eq!(DeclareQueue::header(), header),
            other => panic!("decoded {} instead of DeclareQueue", other),
        }
    }

    #[test]
    fn two_frames_back_to_back() {
        let mut bytes = encode_frame(0, &HeartBeat.into_frame());
        let ack = Ack::new(3, false);
        bytes.extend_from_slice(&encode_frame(2, &ack.into_frame()));

        let (consumed, channel, frame) = Frame::decode(&bytes, 0).unwrap().unwrap();
        assert_eq!(0, channel);
        assert!(matches!(frame, Frame::HeartBeat(_)));
        let (_, channel, frame) = Frame::decode(&bytes[consumed..], 0).unwrap().unwrap();
        assert_eq!(2, channel);
        match frame {
            Frame::Ack(_, ack) => {
                assert_eq!(3, ack.delivery_tag());
                assert!(!ack.multiple());
            }
            other => panic!("decoded {} instead of Ack", other),
        }
    }

    #[test]
    fn content_frames_round_trip() {
        let header = ContentHeader::new(
            ContentHeaderCommon {
                class: 60,
                weight: 0,
                body_size: 5,
            },
            BasicProperties::default()
                .with_content_type("text/plain")
                .finish(),
        );
        let bytes = encode_frame(4, &header.into_frame());
        let (_, _, frame) = Frame::decode(&bytes, 0).unwrap().unwrap();
        match frame {
            Frame::ContentHeader(header) => {
                assert_eq!(5, header.body_size());
                assert_eq!(
                    Some(&"text/plain".to_string()),
                    header.basic_properties.content_type()
                );
            }
            other => panic!("decoded {} instead of ContentHeader", other),
        }

        let body = ContentBody::new(b"hello".to_vec());
        let bytes = encode_frame(4, &body.into_frame());
        let (_, _, frame) = Frame::decode(&bytes, 0).unwrap().unwrap();
        match frame {
            Frame::ContentBody(body) => assert_eq!(b"hello".to_vec(), body.inner),
            other => panic!("decoded {} instead of ContentBody", other),
        }
    }
}
