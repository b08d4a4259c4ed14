//! Per-channel handling of inbound frames, run on the reader thread.
//!
//! Covers the content reassembly state machine, synchronous-reply
//! correlation, publisher-confirm resolution, and the server-initiated
//! channel events (close, flow, cancel).

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::frame::{
    BasicProperties, CancelOk, CloseChannelOk, ContentHeader, FlowOk, Frame,
};

use super::super::connection::ConnectionCore;
use super::super::error::{Error, Result};
use super::super::message::{DeliveryInfo, Message};
use super::{Channel, ChannelCore, ChannelState};

/// Content reassembly: a content-bearing method, then exactly one
/// header, then body frames until `body_size` octets have arrived.
pub(crate) struct Assembler {
    state: State,
}

enum State {
    Idle,
    AwaitHeader { method: Frame },
    AwaitBody(Partial),
}

struct Partial {
    method: Frame,
    properties: BasicProperties,
    body_size: u64,
    body: Vec<u8>,
}

/// A fully reassembled content method.
pub(crate) struct Content {
    pub(crate) method: Frame,
    pub(crate) properties: BasicProperties,
    pub(crate) body: Vec<u8>,
}

impl Assembler {
    pub(crate) fn new() -> Self {
        Self { state: State::Idle }
    }

    fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    fn start(&mut self, method: Frame) -> Result<()> {
        if !self.is_idle() {
            return Err(Error::UnexpectedFrame(format!(
                "{} while awaiting content frames",
                method
            )));
        }
        self.state = State::AwaitHeader { method };
        Ok(())
    }

    fn header(&mut self, header: ContentHeader) -> Result<Option<Content>> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::AwaitHeader { method } => {
                let body_size = header.body_size();
                if body_size == 0 {
                    return Ok(Some(Content {
                        method,
                        properties: header.basic_properties,
                        body: Vec::new(),
                    }));
                }
                self.state = State::AwaitBody(Partial {
                    method,
                    properties: header.basic_properties,
                    body_size,
                    body: Vec::with_capacity(body_size as usize),
                });
                Ok(None)
            }
            _ => Err(Error::UnexpectedFrame(
                "content header without a content method".into(),
            )),
        }
    }

    fn body(&mut self, chunk: Vec<u8>) -> Result<Option<Content>> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::AwaitBody(mut partial) => {
                partial.body.extend_from_slice(&chunk);
                let got = partial.body.len() as u64;
                if got > partial.body_size {
                    return Err(Error::FrameSyntax(format!(
                        "content body of {} octets overflows declared size {}",
                        got, partial.body_size
                    )));
                }
                if got == partial.body_size {
                    return Ok(Some(Content {
                        method: partial.method,
                        properties: partial.properties,
                        body: partial.body,
                    }));
                }
                self.state = State::AwaitBody(partial);
                Ok(None)
            }
            _ => Err(Error::UnexpectedFrame(
                "content body without a content header".into(),
            )),
        }
    }
}

/// Route one inbound frame to a channel. An `Err` is a connection-level
/// protocol violation and tears the connection down.
pub(crate) fn dispatch(
    conn: &Arc<ConnectionCore>,
    core: &Arc<ChannelCore>,
    frame: Frame,
) -> Result<()> {
    // mid-assembly, only header and body frames may arrive
    {
        let assembler = core.assembler().lock().expect("assembler lock");
        if !assembler.is_idle()
            && !matches!(
                frame,
                Frame::ContentHeader(_) | Frame::ContentBody(_)
            )
        {
            return Err(Error::UnexpectedFrame(format!(
                "{} interleaved with content frames on channel {}",
                frame,
                core.id()
            )));
        }
    }

    match frame {
        // content-bearing methods open a reassembly
        Frame::Deliver(..) | Frame::GetOk(..) | Frame::Return(..) => core
            .assembler()
            .lock()
            .expect("assembler lock")
            .start(frame),
        Frame::ContentHeader(header) => {
            let done = core
                .assembler()
                .lock()
                .expect("assembler lock")
                .header(header)?;
            if let Some(content) = done {
                deliver_content(conn, core, content);
            }
            Ok(())
        }
        Frame::ContentBody(body) => {
            let done = core
                .assembler()
                .lock()
                .expect("assembler lock")
                .body(body.inner)?;
            if let Some(content) = done {
                deliver_content(conn, core, content);
            }
            Ok(())
        }

        // get on an empty queue completes the basic.get RPC without content
        Frame::GetEmpty(..) => {
            if !core.fulfill_rpc(frame, None) {
                warn!("get-empty with no get pending on channel {}", core.id());
            }
            Ok(())
        }

        // server closes the channel, a channel exception
        Frame::CloseChannel(_, close) => {
            conn.send_frame(core.id(), CloseChannelOk.into_frame())
                .unwrap_or_else(|err| warn!("failed to reply close-ok: {}", err));
            let reason = (close.reply_code(), close.reply_text().clone());
            core.mark_closed(
                Some(reason.clone()),
                Error::ChannelClosed {
                    reply_code: reason.0,
                    reply_text: reason.1,
                },
            );
            let channel = Channel::from_parts(conn.clone(), core.clone());
            core.with_callback(|cb| {
                if let Err(err) = cb.close(&channel, &close) {
                    error!("close callback failed on {}: {}", channel, err);
                }
            });
            conn.remove_channel(core.id());
            Ok(())
        }

        // close-ok either completes a close() RPC or finalizes the
        // close started when the last handle dropped
        Frame::CloseChannelOk(..) => {
            if !core.fulfill_rpc(frame, None) {
                if core.state() == ChannelState::Closing {
                    core.mark_closed(
                        None,
                        Error::ChannelUse(format!("channel {} is closed", core.id())),
                    );
                    conn.remove_channel(core.id());
                } else {
                    return Err(Error::UnexpectedFrame(format!(
                        "close-ok with no close pending on channel {}",
                        core.id()
                    )));
                }
            }
            Ok(())
        }

        // server pauses or resumes publishing
        Frame::Flow(_, flow) => {
            core.set_flow_active(flow.active());
            let channel = Channel::from_parts(conn.clone(), core.clone());
            let mut report = flow.active();
            core.with_callback(|cb| match cb.flow(&channel, flow.active()) {
                Ok(active) => report = active,
                Err(err) => error!("flow callback failed on {}: {}", channel, err),
            });
            conn.send_frame(core.id(), FlowOk::new(report).into_frame())
        }

        // consumer-cancel notification (RabbitMQ)
        Frame::Cancel(_, cancel) => {
            let channel = Channel::from_parts(conn.clone(), core.clone());
            match core.remove_consumer(cancel.consumer_tag()) {
                Some(mut consumer) => consumer.cancel(&channel, &cancel),
                None => warn!(
                    "server cancelled unknown consumer {} on {}",
                    cancel.consumer_tag(),
                    channel
                ),
            }
            core.with_callback(|cb| {
                if let Err(err) = cb.cancel(&channel, &cancel) {
                    error!("cancel callback failed on {}: {}", channel, err);
                }
            });
            if !cancel.no_wait() {
                let reply = CancelOk::new(
                    cancel
                        .consumer_tag()
                        .clone()
                        .try_into()
                        .map_err(Error::from)?,
                );
                conn.send_frame(core.id(), reply.into_frame())?;
            }
            Ok(())
        }

        // publisher confirms: the callback runs before the waiters in
        // `basic_publish_confirm` are released
        Frame::Ack(_, ack) => {
            let channel = Channel::from_parts(conn.clone(), core.clone());
            core.with_callback(|cb| cb.publish_ack(&channel, &ack));
            core.resolve_confirms(ack.delivery_tag(), ack.multiple());
            Ok(())
        }
        Frame::Nack(_, nack) => {
            let channel = Channel::from_parts(conn.clone(), core.clone());
            core.with_callback(|cb| cb.publish_nack(&channel, &nack));
            core.resolve_confirms(nack.delivery_tag(), nack.multiple());
            Ok(())
        }

        // everything else is a synchronous reply
        other => {
            let name = other.name();
            if !core.fulfill_rpc(other, None) {
                return Err(Error::UnexpectedFrame(format!(
                    "{} with no rpc pending on channel {}",
                    name,
                    core.id()
                )));
            }
            Ok(())
        }
    }
}

fn deliver_content(conn: &Arc<ConnectionCore>, core: &Arc<ChannelCore>, content: Content) {
    let Content {
        method,
        properties,
        body,
    } = content;
    match method {
        Frame::Deliver(_, deliver) => {
            let tag = deliver.consumer_tag().clone();
            let message = Message::delivered(DeliveryInfo::from(&deliver), properties, body);
            let channel = Channel::from_parts(conn.clone(), core.clone());
            let invoked = core
                .with_consumer(&tag, |consumer| consumer.deliver(&channel, message))
                .is_some();
            if invoked {
                conn.notify_delivery();
            } else {
                // no such consumer: drop the content (AMQP 1.8.3.9)
                info!("discarding delivery for unknown consumer {} on channel {}", tag, core.id());
            }
        }
        frame @ Frame::GetOk(..) => {
            if !core.fulfill_rpc(frame, Some((properties, body))) {
                warn!("get-ok with no get pending on channel {}", core.id());
            }
        }
        Frame::Return(_, ret) => {
            let channel = Channel::from_parts(conn.clone(), core.clone());
            core.with_callback(|cb| cb.publish_return(&channel, ret, properties, body));
        }
        other => error!("content completed for non-content method {}", other),
    }
}
