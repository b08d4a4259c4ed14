use lepus_serde::types::FieldTable;

use crate::frame::{Bind, Declare, Delete, Frame, Unbind};

use super::super::error::{Error, Result};
use super::super::impl_chainable_setter;
use super::{try_shortstr, Channel};

/// Arguments for [`exchange_declare`]
///
/// # Support chainable methods to build arguments
/// ```
/// # use lepus::channel::ExchangeDeclareArguments;
/// let args = ExchangeDeclareArguments::new("events", "topic")
///     .durable(true)
///     .finish();
/// ```
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#exchange.declare).
///
/// [`exchange_declare`]: struct.Channel.html#method.exchange_declare
#[derive(Debug, Clone)]
pub struct ExchangeDeclareArguments {
    /// Exchange name. Default: "".
    pub exchange: String,
    /// Exchange type: "direct", "fanout", "topic" or "headers".
    /// Default: "direct".
    pub exchange_type: String,
    /// Default: `false`.
    pub passive: bool,
    /// Default: `false`.
    pub durable: bool,
    /// Default: `false`.
    pub auto_delete: bool,
    /// Default: `false`.
    pub internal: bool,
    /// Default: `false`.
    pub no_wait: bool,
    /// Default: empty table.
    pub arguments: FieldTable,
}

impl Default for ExchangeDeclareArguments {
    fn default() -> Self {
        Self {
            exchange: String::new(),
            exchange_type: "direct".to_owned(),
            passive: false,
            durable: false,
            auto_delete: false,
            internal: false,
            no_wait: false,
            arguments: FieldTable::new(),
        }
    }
}

impl ExchangeDeclareArguments {
    /// Create new arguments with defaults.
    pub fn new(exchange: &str, exchange_type: &str) -> Self {
        Self {
            exchange: exchange.to_owned(),
            exchange_type: exchange_type.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exchange, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exchange_type, String
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
        auto_delete, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        internal, bool
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

/// Arguments for [`exchange_delete`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#exchange.delete).
///
/// [`exchange_delete`]: struct.Channel.html#method.exchange_delete
#[derive(Debug, Clone, Default)]
pub struct ExchangeDeleteArguments {
    /// Exchange name. Default: "".
    pub exchange: String,
    /// Default: `false`.
    pub if_unused: bool,
    /// Default: `false`.
    pub no_wait: bool,
}

impl ExchangeDeleteArguments {
    /// Create new arguments with defaults.
    pub fn new(exchange: &str) -> Self {
        Self {
            exchange: exchange.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exchange, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        if_unused, bool
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

/// Arguments for [`exchange_bind`] and [`exchange_unbind`] (RabbitMQ
/// extension).
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#exchange.bind).
///
/// [`exchange_bind`]: struct.Channel.html#method.exchange_bind
/// [`exchange_unbind`]: struct.Channel.html#method.exchange_unbind
#[derive(Debug, Clone, Default)]
pub struct ExchangeBindArguments {
    /// Exchange receiving the routed messages. Default: "".
    pub destination: String,
    /// Exchange the messages come from. Default: "".
    pub source: String,
    /// Default: "".
    pub routing_key: String,
    /// Default: `false`.
    pub no_wait: bool,
    /// Default: empty table.
    pub arguments: FieldTable,
}

impl ExchangeBindArguments {
    /// Create new arguments with defaults.
    pub fn new(destination: &str, source: &str, routing_key: &str) -> Self {
        Self {
            destination: destination.to_owned(),
            source: source.to_owned(),
            routing_key: routing_key.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        destination, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        source, String
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

/// APIs for the AMQP exchange class.
impl Channel {
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#exchange.declare)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure, or when the server
    /// rejects the declaration (e.g. passive declare of an absent
    /// exchange closes the channel with 404).
    pub fn exchange_declare(&self, args: ExchangeDeclareArguments) -> Result<()> {
        self.check_open()?;
        let mut declare = Declare::new(
            try_shortstr(&args.exchange)?,
            try_shortstr(&args.exchange_type)?,
            args.arguments,
        );
        declare.set_passive(args.passive);
        declare.set_durable(args.durable);
        declare.set_auto_delete(args.auto_delete);
        declare.set_internal(args.internal);
        declare.set_no_wait(args.no_wait);

        if args.no_wait {
            return self.conn.send_frame(self.core.id(), declare.into_frame());
        }
        match self.rpc_call(declare.into_frame())?.frame {
            Frame::DeclareOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to exchange.declare",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#exchange.delete)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn exchange_delete(&self, args: ExchangeDeleteArguments) -> Result<()> {
        self.check_open()?;
        let mut delete = Delete::new(try_shortstr(&args.exchange)?);
        delete.set_if_unused(args.if_unused);
        delete.set_no_wait(args.no_wait);

        if args.no_wait {
            return self.conn.send_frame(self.core.id(), delete.into_frame());
        }
        match self.rpc_call(delete.into_frame())?.frame {
            Frame::DeleteOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to exchange.delete",
                other
            ))),
        }
    }

    /// Bind an exchange to an exchange (RabbitMQ extension).
    ///
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#exchange.bind)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn exchange_bind(&self, args: ExchangeBindArguments) -> Result<()> {
        self.check_open()?;
        let bind = Bind::new(
            try_shortstr(&args.destination)?,
            try_shortstr(&args.source)?,
            try_shortstr(&args.routing_key)?,
            args.no_wait,
            args.arguments,
        );
        if args.no_wait {
            return self.conn.send_frame(self.core.id(), bind.into_frame());
        }
        match self.rpc_call(bind.into_frame())?.frame {
            Frame::BindOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to exchange.bind",
                other
            ))),
        }
    }

    /// Unbind an exchange from an exchange (RabbitMQ extension).
    ///
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#exchange.unbind)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn exchange_unbind(&self, args: ExchangeBindArguments) -> Result<()> {
        self.check_open()?;
        let unbind = Unbind::new(
            try_shortstr(&args.destination)?,
            try_shortstr(&args.source)?,
            try_shortstr(&args.routing_key)?,
            args.no_wait,
            args.arguments,
        );
        if args.no_wait {
            return self.conn.send_frame(self.core.id(), unbind.into_frame());
        }
        match self.rpc_call(unbind.into_frame())?.frame {
            Frame::UnbindOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to exchange.unbind",
                other
            ))),
        }
    }
}
