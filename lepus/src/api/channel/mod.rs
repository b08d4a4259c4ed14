//! AMQP channel: the logical session all methods run on.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use lepus_serde::types::{AmqpChannelId, ShortStr};
use tracing::{debug, warn};

use crate::frame::{registry, BasicProperties, CloseChannel, Flow, Frame};

use super::callbacks::ChannelCallback;
use super::connection::ConnectionCore;
use super::consumer::Consumer;
use super::error::{Error, Result};

mod basic;
mod confirm;
pub(crate) mod dispatcher;
mod exchange;
mod queue;
mod tx;

pub use basic::*;
pub use confirm::*;
pub use exchange::*;
pub use queue::*;

use dispatcher::Assembler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChannelState {
    /// `channel.open` sent, `open-ok` not yet received.
    Opening,
    Open,
    /// Close initiated locally; the `close-ok` has not arrived yet.
    Closing,
    /// Closed; the server's reason is kept when it initiated the close.
    Closed(Option<(u16, String)>),
}

/// A reply to a synchronous method; content-bearing replies
/// (`basic.get-ok`) also carry the assembled message content.
pub(crate) struct RpcReply {
    pub(crate) frame: Frame,
    pub(crate) content: Option<(BasicProperties, Vec<u8>)>,
}

/// The single outstanding-RPC slot of a channel.
pub(crate) struct RpcSlot {
    /// Reply set of the in-flight request, `None` when no RPC waits.
    expected: Option<&'static [(u16, u16)]>,
    /// Consumer to register once `consume-ok` names the tag; handing it
    /// to the dispatcher makes registration atomic with the reply, so no
    /// delivery can slip in between.
    pending_consumer: Option<Box<dyn Consumer>>,
    result: Option<Result<RpcReply>>,
}

pub(crate) struct ConfirmState {
    enabled: bool,
    /// Next publish sequence number; the first confirmed publish is 1.
    next_tag: u64,
    outstanding: BTreeSet<u64>,
}

pub(crate) struct ChannelCore {
    id: AmqpChannelId,
    state: Mutex<ChannelState>,
    /// Serializes callers of `rpc_call`; at most one RPC is in flight.
    rpc_serial: Mutex<()>,
    rpc: Mutex<RpcSlot>,
    rpc_cv: Condvar,
    consumers: Mutex<HashMap<String, Box<dyn Consumer>>>,
    callback: Mutex<Option<Box<dyn ChannelCallback>>>,
    /// Content reassembly state; only the reader thread touches it.
    assembler: Mutex<Assembler>,
    confirm: Mutex<ConfirmState>,
    confirm_cv: Condvar,
    /// Cleared when the server sends `channel.flow` with active = false.
    flow_active: AtomicBool,
    /// Live `Channel` handles; the last one to drop closes the channel.
    handles: AtomicUsize,
}

impl ChannelCore {
    pub(crate) fn new(id: AmqpChannelId) -> Self {
        Self {
            id,
            state: Mutex::new(ChannelState::Opening),
            rpc_serial: Mutex::new(()),
            rpc: Mutex::new(RpcSlot {
                expected: None,
                pending_consumer: None,
                result: None,
            }),
            rpc_cv: Condvar::new(),
            consumers: Mutex::new(HashMap::new()),
            callback: Mutex::new(None),
            assembler: Mutex::new(Assembler::new()),
            confirm: Mutex::new(ConfirmState {
                enabled: false,
                next_tag: 1,
                outstanding: BTreeSet::new(),
            }),
            confirm_cv: Condvar::new(),
            flow_active: AtomicBool::new(true),
            handles: AtomicUsize::new(0),
        }
    }

    pub(crate) fn id(&self) -> AmqpChannelId {
        self.id
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state.lock().expect("channel state lock").clone()
    }

    pub(crate) fn set_state(&self, state: ChannelState) {
        *self.state.lock().expect("channel state lock") = state;
    }

    /// Fulfill the pending RPC if `frame` is in its expected reply set.
    /// Returns `false` when no RPC is waiting for this method.
    pub(crate) fn fulfill_rpc(
        &self,
        frame: Frame,
        content: Option<(BasicProperties, Vec<u8>)>,
    ) -> bool {
        let mut slot = self.rpc.lock().expect("rpc slot lock");
        let matched = match (slot.expected, frame.method_header()) {
            (Some(expected), Some(header)) => {
                expected.contains(&(header.class_id(), header.method_id()))
            }
            _ => false,
        };
        if !matched {
            return false;
        }
        // consume-ok names the tag the consumer registers under
        if let Frame::ConsumeOk(_, consume_ok) = &frame {
            if let Some(consumer) = slot.pending_consumer.take() {
                self.consumers
                    .lock()
                    .expect("consumer registry lock")
                    .insert(consume_ok.consumer_tag().clone(), consumer);
            }
        }
        slot.expected = None;
        slot.result = Some(Ok(RpcReply { frame, content }));
        self.rpc_cv.notify_all();
        true
    }

    /// Wake a pending RPC with an error, e.g. on channel or connection
    /// close.
    pub(crate) fn fail_rpc(&self, cause: Error) {
        let mut slot = self.rpc.lock().expect("rpc slot lock");
        if slot.expected.take().is_some() {
            slot.pending_consumer = None;
            slot.result = Some(Err(cause));
            self.rpc_cv.notify_all();
        }
    }

    /// Transition to closed and wake every waiter on this channel.
    pub(crate) fn mark_closed(&self, reason: Option<(u16, String)>, cause: Error) {
        self.set_state(ChannelState::Closed(reason));
        self.fail_rpc(cause);
        self.confirm_cv.notify_all();
    }

    pub(crate) fn set_flow_active(&self, active: bool) {
        self.flow_active.store(active, Ordering::SeqCst);
    }

    pub(crate) fn with_consumer<R>(
        &self,
        tag: &str,
        f: impl FnOnce(&mut Box<dyn Consumer>) -> R,
    ) -> Option<R> {
        let mut consumers = self.consumers.lock().expect("consumer registry lock");
        consumers.get_mut(tag).map(f)
    }

    pub(crate) fn remove_consumer(&self, tag: &str) -> Option<Box<dyn Consumer>> {
        self.consumers
            .lock()
            .expect("consumer registry lock")
            .remove(tag)
    }

    pub(crate) fn assembler(&self) -> &Mutex<Assembler> {
        &self.assembler
    }

    pub(crate) fn with_callback(&self, f: impl FnOnce(&mut Box<dyn ChannelCallback>)) {
        let mut callback = self.callback.lock().expect("callback lock");
        if let Some(cb) = callback.as_mut() {
            f(cb);
        }
    }

    /// Resolve publisher-confirm tags; `multiple` resolves everything up
    /// to and including `tag` (`0` means all outstanding).
    pub(crate) fn resolve_confirms(&self, tag: u64, multiple: bool) {
        let mut confirm = self.confirm.lock().expect("confirm state lock");
        if multiple {
            if tag == 0 {
                confirm.outstanding.clear();
            } else {
                confirm.outstanding = confirm.outstanding.split_off(&(tag + 1));
            }
        } else {
            confirm.outstanding.remove(&tag);
        }
        self.confirm_cv.notify_all();
    }
}

/// An AMQP channel handle.
///
/// Cheap to clone and safe to share across threads; synchronous methods
/// serialize on the channel's RPC slot. The last handle to drop closes
/// the channel on the server.
///
/// Create with [`Connection::channel`][crate::connection::Connection::channel].
pub struct Channel {
    pub(crate) conn: Arc<ConnectionCore>,
    pub(crate) core: Arc<ChannelCore>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("channel_id", &self.core.id)
            .finish()
    }
}

impl Channel {
    pub(crate) fn from_parts(conn: Arc<ConnectionCore>, core: Arc<ChannelCore>) -> Self {
        core.handles.fetch_add(1, Ordering::SeqCst);
        Self { conn, core }
    }

    pub fn channel_id(&self) -> AmqpChannelId {
        self.core.id
    }

    pub fn is_open(&self) -> bool {
        self.core.state() == ChannelState::Open
    }

    /// Register the callback receiving this channel's server-initiated
    /// events. Register before the events can occur, e.g. before the
    /// first publish when listening for returns or confirms.
    pub fn register_callback(&self, callback: impl ChannelCallback + 'static) {
        *self.core.callback.lock().expect("callback lock") = Some(Box::new(callback));
    }

    /// See [AMQP 0-9-1 reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#channel.flow).
    ///
    /// Returns the active state the server reports back.
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure or channel close.
    pub fn flow(&self, active: bool) -> Result<bool> {
        let reply = self.rpc_call(Flow::new(active).into_frame())?;
        match reply.frame {
            Frame::FlowOk(_, flow_ok) => Ok(flow_ok.active()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to channel.flow",
                other
            ))),
        }
    }

    /// Close the channel and await the server's `close-ok`.
    pub fn close(self) -> Result<()> {
        match self.core.state() {
            ChannelState::Open | ChannelState::Opening => {}
            // already closed, nothing to do on the wire
            _ => return Ok(()),
        }
        let reply = self.rpc_call(CloseChannel::default().into_frame());
        self.core
            .mark_closed(None, Error::ChannelUse(format!("channel {} is closed", self.core.id)));
        self.conn.remove_channel(self.core.id);
        reply.map(|_| ())
    }

    /// Block the caller until a synchronous method's reply arrives.
    ///
    /// Holds the channel's RPC serial lock for the duration, so a second
    /// caller waits for the first; the reader thread fulfills the slot.
    pub(crate) fn rpc_call(&self, request: Frame) -> Result<RpcReply> {
        self.rpc_call_with(request, None)
    }

    /// `rpc_call` for `basic.consume`: the consumer rides in the RPC slot
    /// and the dispatcher registers it under the tag `consume-ok` names,
    /// before any delivery for that tag can be processed.
    pub(crate) fn rpc_call_with(
        &self,
        request: Frame,
        pending_consumer: Option<Box<dyn Consumer>>,
    ) -> Result<RpcReply> {
        let _serial = self.core.rpc_serial.lock().expect("rpc serial lock");

        let header = request
            .method_header()
            .ok_or_else(|| Error::Internal("rpc request without method header".into()))?;
        let expected = registry::replies_of(header.class_id(), header.method_id());
        debug_assert!(!expected.is_empty(), "rpc_call with an asynchronous method");

        match self.core.state() {
            ChannelState::Open | ChannelState::Opening => {}
            ChannelState::Closing if matches!(request, Frame::CloseChannel(..)) => {}
            ChannelState::Closed(Some((reply_code, reply_text))) => {
                return Err(Error::ChannelClosed {
                    reply_code,
                    reply_text,
                })
            }
            _ => {
                return Err(Error::ChannelUse(format!(
                    "channel {} is closed",
                    self.core.id
                )))
            }
        }

        {
            let mut slot = self.core.rpc.lock().expect("rpc slot lock");
            slot.expected = Some(expected);
            slot.pending_consumer = pending_consumer;
            slot.result = None;
        }

        if let Err(err) = self.conn.send_frame(self.core.id, request) {
            let mut slot = self.core.rpc.lock().expect("rpc slot lock");
            slot.expected = None;
            slot.pending_consumer = None;
            return Err(err);
        }

        let deadline = Instant::now() + self.conn.rpc_timeout();
        let mut slot = self.core.rpc.lock().expect("rpc slot lock");
        loop {
            if let Some(result) = slot.result.take() {
                return result;
            }
            let now = Instant::now();
            if now >= deadline {
                slot.expected = None;
                slot.pending_consumer = None;
                return Err(Error::Timeout);
            }
            let (guard, _) = self
                .core
                .rpc_cv
                .wait_timeout(slot, deadline - now)
                .expect("rpc slot lock");
            slot = guard;
        }
    }

    pub(crate) fn register_consumer(&self, tag: String, consumer: Box<dyn Consumer>) {
        self.core
            .consumers
            .lock()
            .expect("consumer registry lock")
            .insert(tag, consumer);
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        match self.core.state() {
            ChannelState::Open => Ok(()),
            ChannelState::Closed(Some((reply_code, reply_text))) => Err(Error::ChannelClosed {
                reply_code,
                reply_text,
            }),
            _ => Err(Error::ChannelUse(format!(
                "channel {} is closed",
                self.core.id
            ))),
        }
    }
}

/// Validate a name argument against the `shortstr` bound before it can
/// reach the wire.
pub(crate) fn try_shortstr(value: &str) -> Result<ShortStr> {
    value
        .try_into()
        .map_err(|_| Error::ChannelUse(format!("'{}' exceeds 255 bytes", value)))
}

impl Clone for Channel {
    fn clone(&self) -> Self {
        Self::from_parts(self.conn.clone(), self.core.clone())
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if self.core.handles.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        // last handle gone with the channel still open: close it on the
        // server without waiting for the reply, which the dispatcher
        // finalizes when close-ok arrives
        if self.core.state() == ChannelState::Open {
            debug!("closing dropped channel {}", self.core.id);
            self.core.set_state(ChannelState::Closing);
            if self
                .conn
                .send_frame(self.core.id, CloseChannel::default().into_frame())
                .is_err()
            {
                warn!("failed to close dropped channel {}", self.core.id);
            }
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel {}", self.core.id)
    }
}
