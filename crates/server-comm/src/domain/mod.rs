//! Domain Layer - channel descriptors, headers, configuration and state
//!
//! RULES:
//! - No I/O operations
//! - Pure values; transports and codecs live behind the ports

pub mod channel;
pub mod config;
pub mod header;
pub mod state;

pub use channel::{ChannelDescriptor, Direction, SerializerState, TransportKind};
pub use config::{ServerCommConfig, ServerCommConfigBuilder, GENERATE_ADDRESS};
pub use header::{CommHeader, HeaderFields, EOF_SENTINEL, MSG_HEAD_MARKER};
pub use state::{CommRole, ServerState};
