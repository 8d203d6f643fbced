//! Stream handling for agent stdout/stderr: line framing and event decoding.

mod decoder;
mod events;
mod framer;

pub use decoder::*;
pub use events::*;
pub use framer::*;
