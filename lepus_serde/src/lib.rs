//! Serialization and deserialization of the AMQP 0-9-1 wire format,
//! implemented on top of the serde data model.
//!
//! Method frames are plain structs deriving `Serialize`/`Deserialize`;
//! the [`Serializer`] and [`Deserializer`] map the serde data model onto
//! the packed big-endian layout the protocol defines.

mod de;
mod error;
mod ser;

pub mod constants;
pub mod types;

pub use de::{from_bytes, Deserializer};
pub use error::{Error, Result};
pub use ser::{to_buffer, to_bytes, Serializer};
