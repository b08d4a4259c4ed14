use lepus_serde::types::FieldTable;

use crate::frame::{BindQueue, DeclareQueue, DeleteQueue, Frame, PurgeQueue, UnbindQueue};

use super::super::error::{Error, Result};
use super::super::impl_chainable_setter;
use super::{try_shortstr, Channel};

/// Arguments for [`queue_declare`]
///
/// # Support chainable methods to build arguments
/// ```
/// # use lepus::channel::QueueDeclareArguments;
/// let args = QueueDeclareArguments::new("work")
///     .durable(true)
///     .exclusive(false)
///     .finish();
/// ```
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.declare).
///
/// [`queue_declare`]: struct.Channel.html#method.queue_declare
#[derive(Debug, Clone, Default)]
pub struct QueueDeclareArguments {
    /// Queue name; empty asks the server to generate one. Default: "".
    pub queue: String,
    /// Default: `false`.
    pub passive: bool,
    /// Default: `false`.
    pub durable: bool,
    /// Default: `false`.
    pub exclusive: bool,
    /// Default: `false`.
    pub auto_delete: bool,
    /// Default: `false`.
    pub no_wait: bool,
    /// Default: empty table.
    pub arguments: FieldTable,
}

impl QueueDeclareArguments {
    /// Create new arguments with defaults.
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        queue, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        passive, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        durable, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exclusive, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        auto_delete, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_wait, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        arguments, FieldTable
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`queue_bind`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.bind).
///
/// [`queue_bind`]: struct.Channel.html#method.queue_bind
#[derive(Debug, Clone, Default)]
pub struct QueueBindArguments {
    /// Queue name. Default: "".
    pub queue: String,
    /// Exchange name. Default: "".
    pub exchange: String,
    /// Default: "".
    pub routing_key: String,
    /// Default: `false`.
    pub no_wait: bool,
    /// Default: empty table.
    pub arguments: FieldTable,
}

impl QueueBindArguments {
    /// Create new arguments with defaults.
    pub fn new(queue: &str, exchange: &str, routing_key: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        queue, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exchange, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        routing_key, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_wait, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        arguments, FieldTable
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`queue_unbind`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.unbind).
///
/// [`queue_unbind`]: struct.Channel.html#method.queue_unbind
#[derive(Debug, Clone, Default)]
pub struct QueueUnbindArguments {
    /// Queue name. Default: "".
    pub queue: String,
    /// Exchange name. Default: "".
    pub exchange: String,
    /// Default: "".
    pub routing_key: String,
    /// Default: empty table.
    pub arguments: FieldTable,
}

impl QueueUnbindArguments {
    /// Create new arguments with defaults.
    pub fn new(queue: &str, exchange: &str, routing_key: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        queue, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exchange, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        routing_key, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        arguments, FieldTable
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`queue_purge`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.purge).
///
/// [`queue_purge`]: struct.Channel.html#method.queue_purge
#[derive(Debug, Clone, Default)]
pub struct QueuePurgeArguments {
    /// Queue name. Default: "".
    pub queue: String,
    /// Default: `false`.
    pub no_wait: bool,
}

impl QueuePurgeArguments {
    /// Create new arguments with defaults.
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            no_wait: false,
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        queue, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_wait, bool
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`queue_delete`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.delete).
///
/// [`queue_delete`]: struct.Channel.html#method.queue_delete
#[derive(Debug, Clone, Default)]
pub struct QueueDeleteArguments {
    /// Queue name. Default: "".
    pub queue: String,
    /// Default: `false`.
    pub if_unused: bool,
    /// Default: `false`.
    pub if_empty: bool,
    /// Default: `false`.
    pub no_wait: bool,
}

impl QueueDeleteArguments {
    /// Create new arguments with defaults.
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        queue, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        if_unused, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        if_empty, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_wait, bool
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// APIs for the AMQP queue class.
impl Channel {
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.declare)
    ///
    /// Returns `(queue name, message count, consumer count)`, or [`None`]
    /// when declared with `no_wait`.
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure, or when the server
    /// rejects the declaration (e.g. passive declare of an absent queue
    /// closes the channel with 404).
    pub fn queue_declare(&self, args: QueueDeclareArguments) -> Result<Option<(String, u32, u32)>> {
        self.check_open()?;
        let mut declare = DeclareQueue::new(try_shortstr(&args.queue)?, args.arguments);
        declare.set_passive(args.passive);
        declare.set_durable(args.durable);
        declare.set_exclusive(args.exclusive);
        declare.set_auto_delete(args.auto_delete);
        declare.set_no_wait(args.no_wait);

        if args.no_wait {
            self.conn.send_frame(self.core.id(), declare.into_frame())?;
            return Ok(None);
        }
        match self.rpc_call(declare.into_frame())?.frame {
            Frame::DeclareQueueOk(_, ok) => Ok(Some((
                ok.queue().clone(),
                ok.message_count(),
                ok.consumer_count(),
            ))),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to queue.declare",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.bind)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn queue_bind(&self, args: QueueBindArguments) -> Result<()> {
        self.check_open()?;
        let bind = BindQueue::new(
            try_shortstr(&args.queue)?,
            try_shortstr(&args.exchange)?,
            try_shortstr(&args.routing_key)?,
            args.no_wait,
            args.arguments,
        );
        if args.no_wait {
            return self.conn.send_frame(self.core.id(), bind.into_frame());
        }
        match self.rpc_call(bind.into_frame())?.frame {
            Frame::BindQueueOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to queue.bind",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.unbind)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn queue_unbind(&self, args: QueueUnbindArguments) -> Result<()> {
        self.check_open()?;
        let unbind = UnbindQueue::new(
            try_shortstr(&args.queue)?,
            try_shortstr(&args.exchange)?,
            try_shortstr(&args.routing_key)?,
            args.arguments,
        );
        match self.rpc_call(unbind.into_frame())?.frame {
            Frame::UnbindQueueOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to queue.unbind",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.purge)
    ///
    /// Returns the number of messages purged, or [`None`] with `no_wait`.
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn queue_purge(&self, args: QueuePurgeArguments) -> Result<Option<u32>> {
        self.check_open()?;
        let purge = PurgeQueue::new(try_shortstr(&args.queue)?, args.no_wait);
        if args.no_wait {
            self.conn.send_frame(self.core.id(), purge.into_frame())?;
            return Ok(None);
        }
        match self.rpc_call(purge.into_frame())?.frame {
            Frame::PurgeQueueOk(_, ok) => Ok(Some(ok.message_count())),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to queue.purge",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#queue.delete)
    ///
    /// Returns the number of messages deleted, or [`None`] with `no_wait`.
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn queue_delete(&self, args: QueueDeleteArguments) -> Result<Option<u32>> {
        self.check_open()?;
        let mut delete = DeleteQueue::new(try_shortstr(&args.queue)?);
        delete.set_if_unused(args.if_unused);
        delete.set_if_empty(args.if_empty);
        delete.set_no_wait(args.no_wait);

        if args.no_wait {
            self.conn.send_frame(self.core.id(), delete.into_frame())?;
            return Ok(None);
        }
        match self.rpc_call(delete.into_frame())?.frame {
            Frame::DeleteQueueOk(_, ok) => Ok(Some(ok.message_count())),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to queue.delete",
                other
            ))),
        }
    }
}
