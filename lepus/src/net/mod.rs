//! Blocking transport and frame-level I/O.

mod error;
mod frame_io;
mod transport;

pub use error::Error;
pub use frame_io::{ChannelFrame, FrameReader, FrameWriter};
pub use transport::Transport;
