//! AMQP connection: socket ownership, handshake, frame dispatch, and the
//! heartbeat clock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use lepus_serde::types::{AmqpChannelId, FieldTable, FieldValue};
use tracing::{debug, error, info, warn};

use crate::frame::{
    Close, CloseOk, Frame, HeartBeat, Open, OpenChannel, SecureOk, StartOk, TuneOk,
    CONN_DEFAULT_CHANNEL,
};
use crate::net::{FrameReader, FrameWriter, Transport};

use super::callbacks::ConnectionCallback;
use super::channel::{dispatcher, Channel, ChannelCore, ChannelState};
use super::error::{Error, Result};
use super::impl_chainable_setter;
use super::security::SecurityCredentials;
#[cfg(feature = "tls")]
use super::tls::TlsAdaptor;

const DEFAULT_HEARTBEAT: u16 = 60;
const DEFAULT_FRAME_MAX: u32 = 131072;
const DEFAULT_CHANNEL_MAX: u16 = 2047;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);
const HEARTBEAT_TICK: Duration = Duration::from_millis(250);

/// Arguments for [`Connection::open`]
///
/// # Support chainable methods to build arguments
/// ```
/// # use lepus::connection::OpenConnectionArguments;
/// let args = OpenConnectionArguments::new("localhost", 5672, "guest", "guest")
///     .virtual_host("/".to_owned())
///     .heartbeat(30)
///     .finish();
/// ```
#[derive(Clone)]
pub struct OpenConnectionArguments {
    /// Default: "localhost".
    pub host: String,
    /// Default: 5672 (5671 is conventional for TLS).
    pub port: u16,
    /// Default: "/".
    pub virtual_host: String,
    /// Default: PLAIN with guest/guest.
    pub credentials: SecurityCredentials,
    /// Requested heartbeat interval in seconds, 0 disables.
    /// Default: 60.
    pub heartbeat: u16,
    /// Requested maximum frame size in octets, 0 means unlimited.
    /// Default: 131072.
    pub frame_max: u32,
    /// Requested maximum channel number, 0 means unlimited.
    /// Default: 2047.
    pub channel_max: u16,
    /// Bounds the TCP connect and the handshake. Default: 10 s.
    pub connect_timeout: Duration,
    /// Deadline for synchronous method replies. Default: 30 s.
    pub rpc_timeout: Duration,
    /// Default: "en_US".
    pub locale: String,
    /// Shown in the RabbitMQ management UI when set. Default: none.
    pub connection_name: Option<String>,
    /// Negotiate TLS over the TCP connection. Default: none.
    #[cfg(feature = "tls")]
    pub tls_adaptor: Option<TlsAdaptor>,
}

impl OpenConnectionArguments {
    /// Create new arguments with defaults.
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            host: host.to_owned(),
            port,
            virtual_host: "/".to_owned(),
            credentials: SecurityCredentials::new_plain(username, password),
            heartbeat: DEFAULT_HEARTBEAT,
            frame_max: DEFAULT_FRAME_MAX,
            channel_max: DEFAULT_CHANNEL_MAX,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            locale: "en_US".to_owned(),
            connection_name: None,
            #[cfg(feature = "tls")]
            tls_adaptor: None,
        }
    }

    impl_chainable_setter! {
        /// Chainable setter method.
        host, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        port, u16
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        virtual_host, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        credentials, SecurityCredentials
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        heartbeat, u16
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        frame_max, u32
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        channel_max, u16
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        connect_timeout, Duration
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        rpc_timeout, Duration
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        locale, String
    }

    /// Chainable setter method.
    pub fn connection_name(&mut self, name: &str) -> &mut Self {
        self.connection_name = Some(name.to_owned());
        self
    }

    /// Chainable setter method.
    #[cfg(feature = "tls")]
    pub fn tls_adaptor(&mut self, adaptor: TlsAdaptor) -> &mut Self {
        self.tls_adaptor = Some(adaptor);
        self
    }

    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ConnState {
    Open,
    Closing,
    Closed,
}

#[derive(Default)]
struct DeliveryCounter {
    dispatched: u64,
    drained: u64,
}

struct ConnStatus {
    state: ConnState,
    /// First fatal error; every later operation fails with it.
    cause: Option<Error>,
    close_ok_received: bool,
}

pub(crate) struct ConnectionCore {
    writer: Mutex<FrameWriter>,
    status: Mutex<ConnStatus>,
    status_cv: Condvar,
    channels: Mutex<BTreeMap<AmqpChannelId, Arc<ChannelCore>>>,
    callback: Mutex<Option<Box<dyn ConnectionCallback>>>,
    server_properties: FieldTable,
    channel_max: u16,
    frame_max: u32,
    heartbeat: u16,
    rpc_timeout: Duration,
    last_read: Mutex<Instant>,
    last_write: Mutex<Instant>,
    shutdown: AtomicBool,
    /// Consumer callbacks invoked since the connection opened, and how
    /// many of them `drain_events` callers have already observed.
    deliveries: Mutex<DeliveryCounter>,
    drain_cv: Condvar,
    /// Serializes concurrent `drain_events` callers.
    drain_serial: Mutex<()>,
    handles: AtomicUsize,
    reader_thread: Mutex<Option<(ThreadId, JoinHandle<()>)>>,
    heartbeat_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionCore {
    pub(crate) fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    fn check_sendable(&self) -> Result<()> {
        let status = self.status.lock().expect("status lock");
        match status.state {
            ConnState::Open | ConnState::Closing => Ok(()),
            ConnState::Closed => Err(status.cause.clone().unwrap_or(Error::ConnectionClosed {
                reply_code: 200,
                reply_text: "connection closed".into(),
            })),
        }
    }

    /// Write one frame under the connection write lock.
    pub(crate) fn send_frame(&self, channel_id: AmqpChannelId, frame: Frame) -> Result<()> {
        self.check_sendable()?;
        let res = {
            let mut writer = self.writer.lock().expect("writer lock");
            writer.write_frame(channel_id, frame)
        };
        match res {
            Ok(_) => {
                *self.last_write.lock().expect("last_write lock") = Instant::now();
                Ok(())
            }
            Err(err) => {
                let err: Error = err.into();
                self.abort(err.clone());
                Err(err)
            }
        }
    }

    /// Write a full publish (method + header + chunked body) under one
    /// acquisition of the write lock, so no other channel's frame can
    /// interleave.
    pub(crate) fn send_content(
        &self,
        channel_id: AmqpChannelId,
        publish: crate::frame::Publish,
        header: crate::frame::ContentHeader,
        body: &[u8],
    ) -> Result<()> {
        self.check_sendable()?;
        let res = {
            let mut writer = self.writer.lock().expect("writer lock");
            writer.write_content(channel_id, publish, header, body, self.frame_max as usize)
        };
        match res {
            Ok(()) => {
                *self.last_write.lock().expect("last_write lock") = Instant::now();
                Ok(())
            }
            Err(err) => {
                let err: Error = err.into();
                self.abort(err.clone());
                Err(err)
            }
        }
    }

    pub(crate) fn remove_channel(&self, channel_id: AmqpChannelId) {
        self.channels
            .lock()
            .expect("channel directory lock")
            .remove(&channel_id);
    }

    pub(crate) fn notify_delivery(&self) {
        self.deliveries.lock().expect("deliveries lock").dispatched += 1;
        self.drain_cv.notify_all();
    }

    fn touch_read(&self) {
        *self.last_read.lock().expect("last_read lock") = Instant::now();
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Tear the connection down abruptly: mark closed with `cause`, shut
    /// the socket, and wake every waiter on every channel.
    fn abort(&self, cause: Error) {
        {
            let mut status = self.status.lock().expect("status lock");
            if status.state == ConnState::Closed {
                return;
            }
            status.state = ConnState::Closed;
            status.cause = Some(cause.clone());
        }
        self.shutdown.store(true, Ordering::SeqCst);
        self.writer.lock().expect("writer lock").close();
        self.fail_channels(cause);
        self.status_cv.notify_all();
        self.drain_cv.notify_all();
    }

    /// Orderly local close: mark closed without an error cause.
    fn finish_close(&self) {
        {
            let mut status = self.status.lock().expect("status lock");
            status.state = ConnState::Closed;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        self.writer.lock().expect("writer lock").close();
        self.fail_channels(Error::ConnectionClosed {
            reply_code: 200,
            reply_text: "connection closed by client".into(),
        });
        self.status_cv.notify_all();
        self.drain_cv.notify_all();
    }

    fn fail_channels(&self, cause: Error) {
        let reason = match &cause {
            Error::ConnectionClosed {
                reply_code,
                reply_text,
            } => Some((*reply_code, reply_text.clone())),
            _ => None,
        };
        let channels = std::mem::take(&mut *self.channels.lock().expect("channel directory lock"));
        for core in channels.values() {
            core.mark_closed(reason.clone(), cause.clone());
        }
    }

    fn dispatch(this: &Arc<Self>, channel_id: AmqpChannelId, frame: Frame) -> Result<()> {
        if channel_id == CONN_DEFAULT_CHANNEL {
            return Self::dispatch_connection_frame(this, frame);
        }
        let chan = this
            .channels
            .lock()
            .expect("channel directory lock")
            .get(&channel_id)
            .cloned();
        match chan {
            Some(chan) => dispatcher::dispatch(this, &chan, frame),
            None => Err(Error::UnexpectedFrame(format!(
                "{} for unknown channel {}",
                frame, channel_id
            ))),
        }
    }

    fn dispatch_connection_frame(this: &Arc<Self>, frame: Frame) -> Result<()> {
        match frame {
            // inbound traffic of any kind already reset the heartbeat
            // deadline, nothing else to do
            Frame::HeartBeat(_) => Ok(()),

            // server-initiated close: confirm, then fail everything with
            // the server's reason
            Frame::Close(_, close) => {
                info!("{}", close);
                this.send_frame(CONN_DEFAULT_CHANNEL, CloseOk.into_frame())
                    .unwrap_or_else(|err| warn!("failed to reply close-ok: {}", err));
                let connection = Connection::from_core(this.clone());
                this.with_callback(|cb| {
                    if let Err(err) = cb.close(&connection, &close) {
                        error!("connection close callback failed: {}", err);
                    }
                });
                this.abort(Error::ConnectionClosed {
                    reply_code: close.reply_code(),
                    reply_text: close.reply_text().clone(),
                });
                Ok(())
            }

            Frame::CloseOk(..) => {
                let mut status = this.status.lock().expect("status lock");
                status.close_ok_received = true;
                this.shutdown.store(true, Ordering::SeqCst);
                this.status_cv.notify_all();
                Ok(())
            }

            Frame::Blocked(_, blocked) => {
                let connection = Connection::from_core(this.clone());
                this.with_callback(|cb| cb.blocked(&connection, blocked.reason()));
                Ok(())
            }
            Frame::Unblocked(..) => {
                let connection = Connection::from_core(this.clone());
                this.with_callback(|cb| cb.unblocked(&connection));
                Ok(())
            }

            other => Err(Error::UnexpectedFrame(format!(
                "{} on the connection channel",
                other
            ))),
        }
    }

    fn with_callback(&self, f: impl FnOnce(&mut Box<dyn ConnectionCallback>)) {
        let mut callback = self.callback.lock().expect("connection callback lock");
        if let Some(cb) = callback.as_mut() {
            f(cb);
        }
    }

    /// Reader loop: read, stamp the heartbeat clock, dispatch. A
    /// dispatch error is a protocol violation and aborts the connection.
    fn run_reader(self: Arc<Self>, mut reader: FrameReader) {
        loop {
            if self.is_shutdown() {
                break;
            }
            match reader.try_read_frame() {
                Ok(None) => continue,
                Ok(Some((channel_id, frame))) => {
                    self.touch_read();
                    if let Err(err) = Self::dispatch(&self, channel_id, frame) {
                        error!("fatal protocol error: {}", err);
                        self.abort(err);
                        break;
                    }
                }
                Err(err) => {
                    if !self.is_shutdown() {
                        error!("connection i/o failed: {}", err);
                        self.abort(err.into());
                    }
                    break;
                }
            }
        }
        debug!("reader thread exits");
    }

    /// Heartbeat loop: send an empty frame at half the negotiated
    /// interval of write idleness; declare the peer dead after two
    /// intervals of read silence.
    fn run_heartbeat(self: Arc<Self>, interval: u16) {
        let send_after = Duration::from_secs(u64::from(interval.max(2)) / 2);
        let dead_after = Duration::from_secs(u64::from(interval) * 2);
        loop {
            thread::sleep(HEARTBEAT_TICK);
            if self.is_shutdown() {
                break;
            }
            let read_idle = self.last_read.lock().expect("last_read lock").elapsed();
            if read_idle > dead_after {
                error!(
                    "no frame received for {:?}, missed heartbeat",
                    read_idle
                );
                self.abort(Error::Network("missed heartbeat".into()));
                break;
            }
            let write_idle = self.last_write.lock().expect("last_write lock").elapsed();
            if write_idle >= send_after
                && self
                    .send_frame(CONN_DEFAULT_CHANNEL, HeartBeat.into_frame())
                    .is_err()
            {
                break;
            }
        }
        debug!("heartbeat thread exits");
    }
}

/// An AMQP connection handle.
///
/// Cheap to clone and safe to share across threads; all writes serialize
/// on one internal write lock, and a dedicated reader thread dispatches
/// inbound frames to channels. The last handle to drop shuts the
/// connection down.
pub struct Connection {
    core: Arc<ConnectionCore>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish()
    }
}

impl Connection {
    fn from_core(core: Arc<ConnectionCore>) -> Self {
        core.handles.fetch_add(1, Ordering::SeqCst);
        Self { core }
    }

    /// Connect, authenticate, and tune a new AMQP connection.
    ///
    /// Performs the protocol header exchange, `start`/`start-ok` (and a
    /// `secure`/`secure-ok` round when the server challenges),
    /// `tune`/`tune-ok` negotiation, and `open`/`open-ok`, then spawns
    /// the reader and heartbeat threads.
    ///
    /// # Errors
    ///
    /// Returns an error when the TCP or TLS connect fails, the
    /// handshake times out, authentication is rejected, or the server
    /// closes during open.
    pub fn open(args: &OpenConnectionArguments) -> Result<Self> {
        let transport = Self::connect_transport(args)?;
        let (read_half, write_half) = transport.into_split().map_err(Error::from)?;
        let mut reader = FrameReader::new(read_half);
        let mut writer = FrameWriter::new(write_half);
        let deadline = Instant::now() + args.connect_timeout;

        writer.write_protocol_header().map_err(Error::from)?;

        // start / start-ok
        let start = match Self::expect_ctrl_frame(&mut reader, deadline)? {
            Frame::Start(_, start) => start,
            other => {
                return Err(Error::UnexpectedFrame(format!(
                    "{} instead of connection.start",
                    other
                )))
            }
        };
        if (start.version_major(), start.version_minor()) != (0, 9) {
            return Err(Error::Network(format!(
                "server speaks AMQP {}.{}, not 0.9",
                start.version_major(),
                start.version_minor()
            )));
        }
        let mechanism = args.credentials.mechanism_name();
        if !start
            .mechanisms()
            .split(' ')
            .any(|offered| offered == mechanism)
        {
            return Err(Error::Network(format!(
                "server does not offer auth mechanism {}, only '{}'",
                mechanism,
                start.mechanisms()
            )));
        }
        let server_properties = start.server_properties().clone();

        let start_ok = StartOk::new(
            Self::client_properties(args.connection_name.as_deref()),
            mechanism.try_into()?,
            args.credentials.response().try_into()?,
            args.locale.as_str().try_into()?,
        );
        writer
            .write_frame(CONN_DEFAULT_CHANNEL, start_ok.into_frame())
            .map_err(Error::from)?;

        // secure rounds, then tune
        let tune = loop {
            match Self::expect_ctrl_frame(&mut reader, deadline)? {
                Frame::Secure(_, _secure) => {
                    let secure_ok = SecureOk::new(args.credentials.response().try_into()?);
                    writer
                        .write_frame(CONN_DEFAULT_CHANNEL, secure_ok.into_frame())
                        .map_err(Error::from)?;
                }
                Frame::Tune(_, tune) => break tune,
                Frame::Close(_, close) => {
                    return Err(Error::ConnectionClosed {
                        reply_code: close.reply_code(),
                        reply_text: close.reply_text().clone(),
                    })
                }
                other => {
                    return Err(Error::UnexpectedFrame(format!(
                        "{} instead of connection.tune",
                        other
                    )))
                }
            }
        };

        // 0 means unlimited on either side and loses against any bound
        let channel_max = negotiate(args.channel_max, tune.channel_max());
        let frame_max = negotiate(args.frame_max, tune.frame_max());
        let heartbeat = negotiate(args.heartbeat, tune.heartbeat());
        reader.set_frame_max(frame_max as usize);
        writer
            .write_frame(
                CONN_DEFAULT_CHANNEL,
                TuneOk::new(channel_max, frame_max, heartbeat).into_frame(),
            )
            .map_err(Error::from)?;

        // open / open-ok
        writer
            .write_frame(
                CONN_DEFAULT_CHANNEL,
                Open::new(args.virtual_host.as_str().try_into()?).into_frame(),
            )
            .map_err(Error::from)?;
        match Self::expect_ctrl_frame(&mut reader, deadline)? {
            Frame::OpenOk(..) => {}
            Frame::Close(_, close) => {
                return Err(Error::ConnectionClosed {
                    reply_code: close.reply_code(),
                    reply_text: close.reply_text().clone(),
                })
            }
            other => {
                return Err(Error::UnexpectedFrame(format!(
                    "{} instead of connection.open-ok",
                    other
                )))
            }
        }
        info!(
            "connection open to {}:{} (channel_max {}, frame_max {}, heartbeat {})",
            args.host, args.port, channel_max, frame_max, heartbeat
        );

        let core = Arc::new(ConnectionCore {
            writer: Mutex::new(writer),
            status: Mutex::new(ConnStatus {
                state: ConnState::Open,
                cause: None,
                close_ok_received: false,
            }),
            status_cv: Condvar::new(),
            channels: Mutex::new(BTreeMap::new()),
            callback: Mutex::new(None),
            server_properties,
            channel_max,
            frame_max,
            heartbeat,
            rpc_timeout: args.rpc_timeout,
            last_read: Mutex::new(Instant::now()),
            last_write: Mutex::new(Instant::now()),
            shutdown: AtomicBool::new(false),
            deliveries: Mutex::new(DeliveryCounter::default()),
            drain_cv: Condvar::new(),
            drain_serial: Mutex::new(()),
            handles: AtomicUsize::new(0),
            reader_thread: Mutex::new(None),
            heartbeat_thread: Mutex::new(None),
        });

        let reader_core = core.clone();
        let reader_handle = thread::Builder::new()
            .name("lepus-reader".into())
            .spawn(move || reader_core.run_reader(reader))
            .map_err(|err| Error::Internal(format!("failed to spawn reader thread: {}", err)))?;
        *core.reader_thread.lock().expect("reader thread slot") =
            Some((reader_handle.thread().id(), reader_handle));

        if heartbeat > 0 {
            let heartbeat_core = core.clone();
            let handle = thread::Builder::new()
                .name("lepus-heartbeat".into())
                .spawn(move || heartbeat_core.run_heartbeat(heartbeat))
                .map_err(|err| {
                    Error::Internal(format!("failed to spawn heartbeat thread: {}", err))
                })?;
            *core.heartbeat_thread.lock().expect("heartbeat thread slot") = Some(handle);
        }

        Ok(Self::from_core(core))
    }

    #[cfg(feature = "tls")]
    fn connect_transport(args: &OpenConnectionArguments) -> Result<Transport> {
        let transport = match &args.tls_adaptor {
            Some(adaptor) => {
                Transport::connect_tls(&args.host, args.port, args.connect_timeout, adaptor)
            }
            None => Transport::connect(&args.host, args.port, args.connect_timeout),
        };
        transport.map_err(Error::from)
    }

    #[cfg(not(feature = "tls"))]
    fn connect_transport(args: &OpenConnectionArguments) -> Result<Transport> {
        Transport::connect(&args.host, args.port, args.connect_timeout).map_err(Error::from)
    }

    fn expect_ctrl_frame(reader: &mut FrameReader, deadline: Instant) -> Result<Frame> {
        let (channel_id, frame) = reader.read_frame(Some(deadline)).map_err(Error::from)?;
        if channel_id != CONN_DEFAULT_CHANNEL {
            return Err(Error::UnexpectedFrame(format!(
                "{} on channel {} during handshake",
                frame, channel_id
            )));
        }
        Ok(frame)
    }

    fn client_properties(connection_name: Option<&str>) -> FieldTable {
        fn key(name: &str) -> lepus_serde::types::ShortStr {
            name.try_into().expect("literal key fits a shortstr")
        }
        fn string(value: &str) -> FieldValue {
            FieldValue::S(value.try_into().expect("literal value fits a longstr"))
        }

        let mut capabilities = FieldTable::new();
        for capability in [
            "publisher_confirms",
            "consumer_cancel_notify",
            "basic.nack",
            "connection.blocked",
            "exchange_exchange_bindings",
            "authentication_failure_close",
        ] {
            capabilities.insert(key(capability), FieldValue::t(1));
        }

        let mut properties = FieldTable::new();
        properties.insert(key("capabilities"), FieldValue::F(capabilities));
        properties.insert(key("product"), string("lepus"));
        properties.insert(key("version"), string(env!("CARGO_PKG_VERSION")));
        properties.insert(key("platform"), string("Rust"));
        if let Some(name) = connection_name {
            if let Ok(name) = name.try_into() {
                properties.insert(key("connection_name"), FieldValue::S(name));
            }
        }
        properties
    }

    /// Register the callback receiving connection-level events (close,
    /// blocked, unblocked).
    pub fn register_callback(&self, callback: impl ConnectionCallback + 'static) {
        *self.core.callback.lock().expect("connection callback lock") = Some(Box::new(callback));
    }

    /// Open a channel, auto-allocating the id unless one is given.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is taken, the directory is
    /// exhausted, or the `channel.open` handshake fails.
    pub fn channel(&self, channel_id: Option<AmqpChannelId>) -> Result<Channel> {
        self.check_open()?;
        let core = {
            let mut channels = self.core.channels.lock().expect("channel directory lock");
            let id = match channel_id {
                Some(id) => {
                    if id == 0 || (self.core.channel_max != 0 && id > self.core.channel_max) {
                        return Err(Error::ChannelUse(format!(
                            "channel id {} out of range 1..={}",
                            id, self.core.channel_max
                        )));
                    }
                    if channels.contains_key(&id) {
                        return Err(Error::ChannelUse(format!("channel id {} in use", id)));
                    }
                    id
                }
                None => {
                    let bound = if self.core.channel_max == 0 {
                        u16::MAX
                    } else {
                        self.core.channel_max
                    };
                    (1..=bound)
                        .find(|id| !channels.contains_key(id))
                        .ok_or_else(|| {
                            Error::ChannelUse("all channel ids are in use".to_owned())
                        })?
                }
            };
            let core = Arc::new(ChannelCore::new(id));
            channels.insert(id, core.clone());
            core
        };

        let channel = Channel::from_parts(self.core.clone(), core.clone());
        match channel.rpc_call(OpenChannel::default().into_frame()) {
            Ok(reply) => match reply.frame {
                Frame::OpenChannelOk(..) => {
                    core.set_state(ChannelState::Open);
                    debug!("opened {}", channel);
                    Ok(channel)
                }
                other => {
                    self.core.remove_channel(core.id());
                    Err(Error::UnexpectedFrame(format!(
                        "{} in reply to channel.open",
                        other
                    )))
                }
            },
            Err(err) => {
                self.core.remove_channel(core.id());
                Err(err)
            }
        }
    }

    /// Park the caller until at least one consumer callback has run that
    /// no earlier `drain_events` call already reported, or the timeout
    /// elapses.
    ///
    /// Deliveries are dispatched by the reader thread as they arrive;
    /// this is a convenience for threads that want to pace on consumer
    /// activity. Concurrent callers serialize.
    ///
    /// # Errors
    ///
    /// `Timeout` when no delivery arrived in time; the connection error
    /// when it closed while waiting.
    pub fn drain_events(&self, timeout: Option<Duration>) -> Result<()> {
        let _serial = self.core.drain_serial.lock().expect("drain serial lock");
        let deadline = timeout.map(|t| Instant::now() + t);

        let mut count = self.core.deliveries.lock().expect("deliveries lock");
        loop {
            if count.dispatched > count.drained {
                count.drained = count.dispatched;
                return Ok(());
            }
            {
                let status = self.core.status.lock().expect("status lock");
                if status.state == ConnState::Closed {
                    return Err(status.cause.clone().unwrap_or(Error::ConnectionClosed {
                        reply_code: 200,
                        reply_text: "connection closed".into(),
                    }));
                }
            }
            count = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout);
                    }
                    self.core
                        .drain_cv
                        .wait_timeout(count, deadline - now)
                        .expect("deliveries lock")
                        .0
                }
                None => self
                    .core
                    .drain_cv
                    .wait_timeout(count, HEARTBEAT_TICK)
                    .expect("deliveries lock")
                    .0,
            };
        }
    }

    /// Close the connection: `connection.close`, await `close-ok`, shut
    /// the socket, stop the background threads.
    ///
    /// Closing an already-closed connection is a no-op.
    pub fn close(&self) -> Result<()> {
        {
            let mut status = self.core.status.lock().expect("status lock");
            match status.state {
                ConnState::Closed => return Ok(()),
                ConnState::Closing => {}
                ConnState::Open => status.state = ConnState::Closing,
            }
        }

        if self
            .core
            .send_frame(CONN_DEFAULT_CHANNEL, Close::default().into_frame())
            .is_ok()
        {
            let deadline = Instant::now() + self.core.rpc_timeout;
            let mut status = self.core.status.lock().expect("status lock");
            while !status.close_ok_received && status.state != ConnState::Closed {
                let now = Instant::now();
                if now >= deadline {
                    warn!("timed out awaiting connection.close-ok");
                    break;
                }
                status = self
                    .core
                    .status_cv
                    .wait_timeout(status, deadline - now)
                    .expect("status lock")
                    .0;
            }
        }

        self.core.finish_close();
        self.join_background_threads();
        info!("connection closed");
        Ok(())
    }

    fn join_background_threads(&self) {
        let current = thread::current().id();
        if let Some((reader_id, handle)) =
            self.core.reader_thread.lock().expect("reader thread slot").take()
        {
            if reader_id == current {
                // close() invoked from a callback on the reader thread
                return;
            }
            let _ = handle.join();
        }
        if let Some(handle) = self
            .core
            .heartbeat_thread
            .lock()
            .expect("heartbeat thread slot")
            .take()
        {
            let _ = handle.join();
        }
    }

    fn check_open(&self) -> Result<()> {
        let status = self.core.status.lock().expect("status lock");
        match status.state {
            ConnState::Open => Ok(()),
            _ => Err(status.cause.clone().unwrap_or(Error::ConnectionClosed {
                reply_code: 200,
                reply_text: "connection closed".into(),
            })),
        }
    }

    pub fn is_open(&self) -> bool {
        self.core.status.lock().expect("status lock").state == ConnState::Open
    }

    /// Negotiated maximum channel number (0 means unlimited).
    pub fn channel_max(&self) -> u16 {
        self.core.channel_max
    }

    /// Negotiated maximum frame size in octets (0 means unlimited).
    pub fn frame_max(&self) -> u32 {
        self.core.frame_max
    }

    /// Negotiated heartbeat interval in seconds (0 means disabled).
    pub fn heartbeat(&self) -> u16 {
        self.core.heartbeat
    }

    /// The server-properties table from `connection.start`, including
    /// the broker's capability flags.
    pub fn server_properties(&self) -> &FieldTable {
        &self.core.server_properties
    }
}

/// 0 means "no limit" on either side, so any bound wins; otherwise the
/// smaller value is the negotiated one.
fn negotiate<T: Ord + Default + Copy>(client: T, server: T) -> T {
    let unlimited = T::default();
    if client == unlimited {
        server
    } else if server == unlimited {
        client
    } else {
        client.min(server)
    }
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self::from_core(self.core.clone())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.core.handles.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        let is_open = {
            let status = self.core.status.lock().expect("status lock");
            status.state == ConnState::Open
        };
        if is_open {
            debug!("last connection handle dropped, closing");
            let _ = self
                .core
                .send_frame(CONN_DEFAULT_CHANNEL, Close::default().into_frame());
            self.core.finish_close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::negotiate;

    #[test]
    fn negotiation_treats_zero_as_unlimited() {
        assert_eq!(2047u16, negotiate(2047, 0));
        assert_eq!(2047u16, negotiate(0, 2047));
        assert_eq!(0u16, negotiate(0, 0));
        assert_eq!(1024u16, negotiate(2047, 1024));
        assert_eq!(131072u32, negotiate(131072, 131072));
        assert_eq!(60u16, negotiate(60, 60));
    }
}
