//! A scripted in-process broker for integration tests.
//!
//! Each test binds a loopback listener, spawns a thread that plays the
//! broker's side of the conversation with these helpers, and drives the
//! client against it. Frames are built and parsed by hand here, so the
//! tests check the bytes the client actually puts on the wire.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

pub const FRAME_METHOD: u8 = 1;
pub const FRAME_HEADER: u8 = 2;
pub const FRAME_BODY: u8 = 3;
pub const FRAME_HEARTBEAT: u8 = 8;
pub const FRAME_END: u8 = 0xCE;

pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Bind a listener and hand the accepted socket to a broker script
/// running on its own thread. Returns the port and the script handle;
/// join the handle at the end of the test to surface broker panics.
pub fn spawn_broker<F>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(BrokerConn) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let port = listener.local_addr().expect("local addr").port();
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept client");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("read timeout");
        script(BrokerConn { stream });
    });
    (port, handle)
}

pub struct BrokerConn {
    stream: TcpStream,
}

impl BrokerConn {
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

#[derive(Debug)]
pub struct RawFrame {
    pub frame_type: u8,
    pub channel: u16,
    pub payload: Vec<u8>,
}

impl BrokerConn {
    pub fn expect_protocol_header(&mut self) {
        let mut header = [0u8; 8];
        self.stream.read_exact(&mut header).expect("protocol header");
        assert_eq!([0x41, 0x4D, 0x51, 0x50, 0x00, 0x00, 0x09, 0x01], header);
    }

    pub fn read_frame(&mut self) -> RawFrame {
        let mut head = [0u8; 7];
        self.stream.read_exact(&mut head).expect("frame header");
        let frame_type = head[0];
        let channel = u16::from_be_bytes([head[1], head[2]]);
        let size = u32::from_be_bytes([head[3], head[4], head[5], head[6]]) as usize;
        let mut payload = vec![0u8; size];
        self.stream.read_exact(&mut payload).expect("frame payload");
        let mut end = [0u8; 1];
        self.stream.read_exact(&mut end).expect("frame end");
        assert_eq!(FRAME_END, end[0], "frame end marker");
        RawFrame {
            frame_type,
            channel,
            payload,
        }
    }

    /// Read the next method frame, skipping heartbeats, and assert its
    /// class and method ids. Returns the argument bytes.
    pub fn expect_method(&mut self, channel: u16, class_id: u16, method_id: u16) -> MethodArgs {
        loop {
            let frame = self.read_frame();
            if frame.frame_type == FRAME_HEARTBEAT {
                continue;
            }
            assert_eq!(FRAME_METHOD, frame.frame_type, "expected a method frame");
            assert_eq!(channel, frame.channel, "method frame channel");
            let class = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
            let method = u16::from_be_bytes([frame.payload[2], frame.payload[3]]);
            assert_eq!(
                (class_id, method_id),
                (class, method),
                "method ids (payload {:02x?})",
                frame.payload
            );
            return MethodArgs::new(frame.payload[4..].to_vec());
        }
    }

    /// Read a content header frame, asserting channel and class 60, and
    /// return the declared body size.
    pub fn expect_content_header(&mut self, channel: u16) -> u64 {
        let frame = self.read_frame();
        assert_eq!(FRAME_HEADER, frame.frame_type, "expected a header frame");
        assert_eq!(channel, frame.channel);
        let class = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
        assert_eq!(60, class);
        u64::from_be_bytes(frame.payload[4..12].try_into().expect("body size"))
    }

    /// Read body frames until `body_size` octets have arrived; returns
    /// the reassembled body and the per-frame payload sizes.
    pub fn expect_body(&mut self, channel: u16, body_size: u64) -> (Vec<u8>, Vec<usize>) {
        let mut body = Vec::new();
        let mut sizes = Vec::new();
        while (body.len() as u64) < body_size {
            let frame = self.read_frame();
            assert_eq!(FRAME_BODY, frame.frame_type, "expected a body frame");
            assert_eq!(channel, frame.channel);
            sizes.push(frame.payload.len());
            body.extend_from_slice(&frame.payload);
        }
        assert_eq!(body_size, body.len() as u64, "body overran declared size");
        (body, sizes)
    }

    pub fn write_frame(&mut self, frame_type: u8, channel: u16, payload: &[u8]) {
        let mut bytes = Vec::with_capacity(payload.len() + 8);
        bytes.push(frame_type);
        bytes.extend_from_slice(&channel.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes.push(FRAME_END);
        self.stream.write_all(&bytes).expect("write frame");
    }

    pub fn write_method(&mut self, channel: u16, class_id: u16, method_id: u16, args: &[u8]) {
        let mut payload = Vec::with_capacity(args.len() + 4);
        payload.extend_from_slice(&class_id.to_be_bytes());
        payload.extend_from_slice(&method_id.to_be_bytes());
        payload.extend_from_slice(args);
        self.write_frame(FRAME_METHOD, channel, &payload);
    }

    /// Send a content-bearing method followed by its header and body,
    /// the body split into `chunks`.
    pub fn write_content(
        &mut self,
        channel: u16,
        class_id: u16,
        method_id: u16,
        args: &[u8],
        chunks: &[&[u8]],
    ) {
        self.write_method(channel, class_id, method_id, args);
        let body_size: usize = chunks.iter().map(|c| c.len()).sum();
        let mut header = Vec::new();
        header.extend_from_slice(&60u16.to_be_bytes());
        header.extend_from_slice(&0u16.to_be_bytes());
        header.extend_from_slice(&(body_size as u64).to_be_bytes());
        header.extend_from_slice(&[0, 0]); // no properties
        self.write_frame(FRAME_HEADER, channel, &header);
        for chunk in chunks {
            self.write_frame(FRAME_BODY, channel, chunk);
        }
    }

    pub fn write_heartbeat(&mut self) {
        self.write_frame(FRAME_HEARTBEAT, 0, &[]);
    }

    /// Play the server side of the connection handshake: `start`,
    /// `tune` with the given values, then accept `open`.
    pub fn handshake(&mut self, channel_max: u16, frame_max: u32, heartbeat: u16) -> HandshakeLog {
        self.expect_protocol_header();

        // connection.start
        let mut start = Vec::new();
        start.push(0); // version major
        start.push(9); // version minor
        start.extend_from_slice(&0u32.to_be_bytes()); // empty server properties
        put_longstr(&mut start, b"PLAIN AMQPLAIN");
        put_longstr(&mut start, b"en_US");
        self.write_method(0, 10, 10, &start);

        let start_ok = self.expect_method(0, 10, 11);

        // connection.tune
        let mut tune = Vec::new();
        tune.extend_from_slice(&channel_max.to_be_bytes());
        tune.extend_from_slice(&frame_max.to_be_bytes());
        tune.extend_from_slice(&heartbeat.to_be_bytes());
        self.write_method(0, 10, 30, &tune);

        let mut tune_ok = self.expect_method(0, 10, 31);
        let negotiated = (tune_ok.u16(), tune_ok.u32(), tune_ok.u16());

        // connection.open -> open-ok
        let mut open = self.expect_method(0, 10, 40);
        let virtual_host = open.shortstr();
        let mut open_ok = Vec::new();
        put_shortstr(&mut open_ok, b"");
        self.write_method(0, 10, 41, &open_ok);

        HandshakeLog {
            start_ok,
            negotiated,
            virtual_host,
        }
    }

    /// Accept a `channel.open` on the given channel.
    pub fn accept_channel_open(&mut self, channel: u16) {
        self.expect_method(channel, 20, 10);
        let mut open_ok = Vec::new();
        put_longstr(&mut open_ok, b"");
        self.write_method(channel, 20, 11, &open_ok);
    }

    /// Accept the client's `connection.close` with `close-ok`.
    pub fn accept_connection_close(&mut self) {
        self.expect_method(0, 10, 50);
        self.write_method(0, 10, 51, &[]);
    }
}

pub struct HandshakeLog {
    pub start_ok: MethodArgs,
    /// `(channel_max, frame_max, heartbeat)` from the client's tune-ok.
    pub negotiated: (u16, u32, u16),
    pub virtual_host: String,
}

/// Cursor over a method frame's argument bytes.
pub struct MethodArgs {
    bytes: Vec<u8>,
    at: usize,
}

impl MethodArgs {
    fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, at: 0 }
    }

    pub fn u8(&mut self) -> u8 {
        let v = self.bytes[self.at];
        self.at += 1;
        v
    }

    pub fn u16(&mut self) -> u16 {
        let v = u16::from_be_bytes(self.bytes[self.at..self.at + 2].try_into().unwrap());
        self.at += 2;
        v
    }

    pub fn u32(&mut self) -> u32 {
        let v = u32::from_be_bytes(self.bytes[self.at..self.at + 4].try_into().unwrap());
        self.at += 4;
        v
    }

    pub fn u64(&mut self) -> u64 {
        let v = u64::from_be_bytes(self.bytes[self.at..self.at + 8].try_into().unwrap());
        self.at += 8;
        v
    }

    pub fn shortstr(&mut self) -> String {
        let len = self.u8() as usize;
        let s = String::from_utf8(self.bytes[self.at..self.at + len].to_vec()).unwrap();
        self.at += len;
        s
    }

    pub fn longstr(&mut self) -> Vec<u8> {
        let len = self.u32() as usize;
        let s = self.bytes[self.at..self.at + len].to_vec();
        self.at += len;
        s
    }

    /// Skip a field table (length-prefixed).
    pub fn skip_table(&mut self) {
        let len = self.u32() as usize;
        self.at += len;
    }
}

pub fn put_shortstr(out: &mut Vec<u8>, s: &[u8]) {
    out.push(s.len() as u8);
    out.extend_from_slice(s);
}

pub fn put_longstr(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s);
}
