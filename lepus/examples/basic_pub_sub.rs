//! Publish a message and consume it back, against a broker on
//! localhost.
//!
//! ```bash
//! cargo run --example basic_pub_sub
//! ```

use std::time::Duration;

use lepus::channel::{
    BasicConsumeArguments, BasicPublishArguments, QueueBindArguments, QueueDeclareArguments,
};
use lepus::connection::{Connection, OpenConnectionArguments};
use lepus::consumer::DefaultConsumer;
use lepus::message::Message;
use lepus::{BasicProperties, DELIVERY_MODE_TRANSIENT};

fn main() -> Result<(), lepus::error::Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let connection = Connection::open(
        &OpenConnectionArguments::new("localhost", 5672, "guest", "guest")
            .connection_name("basic_pub_sub")
            .finish(),
    )?;

    let channel = connection.channel(None)?;
    let (queue_name, ..) = channel
        .queue_declare(QueueDeclareArguments::default())?
        .expect("declared without no_wait");
    channel.queue_bind(QueueBindArguments::new(
        &queue_name,
        "amq.topic",
        "pub.sub.demo",
    ))?;

    let args = BasicConsumeArguments::new(&queue_name, "demo-consumer")
        .no_ack(true)
        .finish();
    channel.basic_consume(DefaultConsumer::new(args.no_ack), args)?;

    let message = Message::new(b"hello from lepus".to_vec()).with_properties(
        BasicProperties::default()
            .with_content_type("text/plain")
            .with_delivery_mode(DELIVERY_MODE_TRANSIENT)
            .finish(),
    );
    channel.basic_publish(message, BasicPublishArguments::new("amq.topic", "pub.sub.demo"))?;

    // wait until the consumer has seen the message
    connection.drain_events(Some(Duration::from_secs(5)))?;

    connection.close()
}
