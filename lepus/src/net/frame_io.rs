use std::time::Instant;

use bytes::{Buf, BufMut, BytesMut};
use lepus_serde::constants::{FRAME_BODY, FRAME_END};
use lepus_serde::to_buffer;
use lepus_serde::types::AmqpChannelId;
use tracing::trace;

use crate::frame::{ContentHeader, Frame, FrameHeader, ProtocolHeader, Publish};

use super::transport::{ReadHalf, WriteHalf};
use super::Error;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Per-frame overhead: 7 header octets plus the end marker.
const FRAME_OVERHEAD: usize = 8;

pub type ChannelFrame = (AmqpChannelId, Frame);

/// Decodes frames off the read half of the transport.
///
/// Bytes accumulate in an internal buffer and a frame is only taken off
/// once it is complete, so a poll that returns empty never loses framing.
pub struct FrameReader {
    stream: ReadHalf,
    buffer: BytesMut,
    frame_max: usize,
}

impl FrameReader {
    pub fn new(stream: ReadHalf) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            frame_max: 0,
        }
    }

    /// Apply the negotiated frame size bound; inbound frames above it are
    /// a framing error.
    pub fn set_frame_max(&mut self, frame_max: usize) {
        self.frame_max = frame_max;
    }

    /// Try to produce one frame, blocking for at most one poll interval.
    ///
    /// `Ok(None)` means the poll elapsed with no complete frame; call
    /// again. Errors are fatal to the connection.
    pub fn try_read_frame(&mut self) -> Result<Option<ChannelFrame>, Error> {
        loop {
            if let Some((consumed, channel, frame)) = Frame::decode(&self.buffer, self.frame_max)? {
                self.buffer.advance(consumed);
                trace!("RECV on channel {}: {}", channel, frame);
                return Ok(Some((channel, frame)));
            }
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.stream.read_some(&mut chunk)? {
                Some(0) => {
                    return Err(if self.buffer.is_empty() {
                        Error::PeerShutdown
                    } else {
                        Error::Interrupted
                    });
                }
                Some(n) => self.buffer.put_slice(&chunk[..n]),
                None => return Ok(None),
            }
        }
    }

    /// Block until a frame arrives or `deadline` passes.
    pub fn read_frame(&mut self, deadline: Option<Instant>) -> Result<ChannelFrame, Error> {
        loop {
            if let Some(frame) = self.try_read_frame()? {
                return Ok(frame);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout);
                }
            }
        }
    }
}

/// Serializes frames onto the write half of the transport.
///
/// Each public method stages complete frames in the buffer and flushes
/// them with a single `write_all`, so a frame is never interleaved with
/// another writer's bytes; the caller serializes access with the
/// connection write lock.
pub struct FrameWriter {
    stream: WriteHalf,
    buffer: BytesMut,
}

impl FrameWriter {
    pub fn new(stream: WriteHalf) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// The protocol header that opens the conversation; not a frame.
    pub fn write_protocol_header(&mut self) -> Result<(), Error> {
        to_buffer(&ProtocolHeader::default(), &mut self.buffer).map_err(crate::frame::Error::from)?;
        self.flush()
    }

    pub fn write_frame(&mut self, channel: AmqpChannelId, frame: Frame) -> Result<(), Error> {
        self.stage_frame(channel, &frame)?;
        trace!("SENT on channel {}: {}", channel, frame);
        self.flush()
    }

    /// Write one published message: method, content header, and the body
    /// chunked to `frame_max - 8` octets per frame, flushed as one unit.
    ///
    /// `frame_max = 0` sends the whole body in a single frame.
    pub fn write_content(
        &mut self,
        channel: AmqpChannelId,
        publish: Publish,
        header: ContentHeader,
        body: &[u8],
        frame_max: usize,
    ) -> Result<(), Error> {
        self.stage_frame(channel, &publish.into_frame())?;
        self.stage_frame(channel, &header.into_frame())?;

        let chunk_size = if frame_max == 0 {
            body.len().max(1)
        } else {
            frame_max - FRAME_OVERHEAD
        };
        for chunk in body.chunks(chunk_size) {
            let header = FrameHeader {
                frame_type: FRAME_BODY,
                channel,
                payload_size: chunk.len() as u32,
            };
            to_buffer(&header, &mut self.buffer).map_err(crate::frame::Error::from)?;
            self.buffer.put_slice(chunk);
            self.buffer.put_u8(FRAME_END);
        }
        trace!(
            "SENT on channel {}: Publish with {} body bytes",
            channel,
            body.len()
        );
        self.flush()
    }

    fn stage_frame(&mut self, channel: AmqpChannelId, frame: &Frame) -> Result<(), Error> {
        let header_at = self.buffer.len();
        let header = FrameHeader {
            frame_type: frame.get_frame_type(),
            channel,
            payload_size: 0,
        };
        to_buffer(&header, &mut self.buffer).map_err(crate::frame::Error::from)?;

        let payload_size =
            to_buffer(frame, &mut self.buffer).map_err(crate::frame::Error::from)? as u32;
        // patch the size now that the payload is encoded
        self.buffer[header_at + 3..header_at + 7].copy_from_slice(&payload_size.to_be_bytes());
        self.buffer.put_u8(FRAME_END);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.stream.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    /// Shut down the underlying socket; safe to call more than once.
    pub fn close(&self) {
        self.stream.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    use lepus_serde::constants::{FRAME_HEADER_SIZE, FRAME_METHOD};

    use crate::frame::{BasicProperties, ContentHeaderCommon};
    use crate::net::Transport;

    use super::*;

    // a loopback pair: the writer under test plus the peer socket that
    // observes its bytes
    fn writer_pair() -> (FrameWriter, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = Transport::connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        let (peer, _) = listener.accept().unwrap();
        let (_read, write) = transport.into_split().unwrap();
        (FrameWriter::new(write), peer)
    }

    fn frames_in(buf: &[u8]) -> Vec<(u8, u16, usize)> {
        let mut frames = Vec::new();
        let mut at = 0;
        while at < buf.len() {
            let frame_type = buf[at];
            let channel = u16::from_be_bytes(buf[at + 1..at + 3].try_into().unwrap());
            let size = u32::from_be_bytes(buf[at + 3..at + 7].try_into().unwrap()) as usize;
            assert_eq!(FRAME_END, buf[at + FRAME_HEADER_SIZE + size]);
            frames.push((frame_type, channel, size));
            at += FRAME_HEADER_SIZE + size + 1;
        }
        frames
    }

    #[test]
    fn content_write_chunks_to_frame_max() {
        let (mut writer, mut peer) = writer_pair();
        let publish = Publish::new("t.e".try_into().unwrap(), "t.q".try_into().unwrap());
        let body = vec![0xAB; 10_000];
        let header = ContentHeader::new(
            ContentHeaderCommon {
                class: 60,
                weight: 0,
                body_size: body.len() as u64,
            },
            BasicProperties::default(),
        );

        writer.write_content(1, publish, header, &body, 4096).unwrap();

        // publish (15) + header (14) + three body frames, each +8 overhead
        let mut observed = vec![0u8; (15 + 8) + (14 + 8) + 10_000 + 3 * 8];
        peer.read_exact(&mut observed).unwrap();
        assert_eq!(
            vec![
                (FRAME_METHOD, 1, 15),
                (lepus_serde::constants::FRAME_HEADER, 1, 14),
                (FRAME_BODY, 1, 4088),
                (FRAME_BODY, 1, 4088),
                (FRAME_BODY, 1, 1824),
            ],
            frames_in(&observed)
        );
    }

    #[test]
    fn empty_body_sends_no_body_frame() {
        let (mut writer, mut peer) = writer_pair();
        let publish = Publish::new("t.e".try_into().unwrap(), "t.q".try_into().unwrap());
        let header = ContentHeader::new(
            ContentHeaderCommon {
                class: 60,
                weight: 0,
                body_size: 0,
            },
            BasicProperties::default(),
        );

        writer.write_content(1, publish, header, &[], 4096).unwrap();
        writer.close();

        let mut observed = Vec::new();
        peer.read_to_end(&mut observed).unwrap();
        assert_eq!(
            vec![
                (FRAME_METHOD, 1, 15),
                (lepus_serde::constants::FRAME_HEADER, 1, 14),
            ],
            frames_in(&observed)
        );
    }

    #[test]
    fn written_method_frame_has_patched_size_and_end_marker() {
        let (mut writer, mut peer) = writer_pair();
        let publish = Publish::new("ex".try_into().unwrap(), "rk".try_into().unwrap());
        writer.write_frame(3, publish.into_frame()).unwrap();
        writer.close();

        let mut observed = Vec::new();
        peer.read_to_end(&mut observed).unwrap();
        // method header (4) + ticket (2) + "ex" (3) + "rk" (3) + bits (1)
        assert_eq!(vec![(FRAME_METHOD, 3, 13)], frames_in(&observed));
    }

    #[test]
    fn reader_assembles_frames_across_polls() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = Transport::connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        let (read, _write) = transport.into_split().unwrap();
        let mut reader = FrameReader::new(read);

        // heartbeat frame split across two writes
        use std::io::Write;
        peer.write_all(&[8, 0, 0, 0, 0]).unwrap();
        assert!(reader.try_read_frame().unwrap().is_none());
        peer.write_all(&[0, 0, FRAME_END]).unwrap();
        let (channel, frame) = reader
            .read_frame(Some(Instant::now() + Duration::from_secs(2)))
            .unwrap();
        assert_eq!(0, channel);
        assert!(matches!(frame, Frame::HeartBeat(_)));
    }
}
