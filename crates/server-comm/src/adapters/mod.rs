//! Adapters Layer
//!
//! Concrete implementations of the driven ports:
//! - `memory`: process-local base channel
//! - `header_codec`: marker-delimited JSON headers
//! - `framing`: decorator attaching headers to outbound messages

pub mod framing;
pub mod header_codec;
pub mod memory;

pub use framing::HeaderFramingChannel;
pub use header_codec::JsonHeaderCodec;
pub use memory::{InMemoryTransport, MemoryTransportConfig};
