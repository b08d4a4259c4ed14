//! A blocking AMQP 0-9-1 client, compatible with RabbitMQ including its
//! protocol extensions (publisher confirms, `basic.nack`,
//! exchange-to-exchange bindings, consumer cancel notifications).
//!
//! The design is thread-based: a connection owns its socket, a reader
//! thread that dispatches inbound frames to channels, and a heartbeat
//! thread. All writes serialize on one write lock; synchronous methods
//! park the calling thread until the reader correlates the reply.
//!
//! ```no_run
//! use lepus::channel::{BasicPublishArguments, QueueDeclareArguments};
//! use lepus::connection::{Connection, OpenConnectionArguments};
//! use lepus::message::Message;
//!
//! # fn main() -> Result<(), lepus::error::Error> {
//! let connection = Connection::open(
//!     &OpenConnectionArguments::new("localhost", 5672, "guest", "guest"),
//! )?;
//! let channel = connection.channel(None)?;
//! channel.queue_declare(QueueDeclareArguments::new("work"))?;
//! channel.basic_publish(
//!     Message::new(b"hello".to_vec()),
//!     BasicPublishArguments::new("", "work"),
//! )?;
//! connection.close()?;
//! # Ok(())
//! # }
//! ```

mod api;
mod frame;
mod net;

pub use api::*;

pub use frame::{
    Ack, BasicProperties, Cancel, Close, CloseChannel, Deliver, GetOk, Nack, Return,
    DELIVERY_MODE_PERSISTENT, DELIVERY_MODE_TRANSIENT,
};
