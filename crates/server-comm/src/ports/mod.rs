//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for callers of the communicator
//! - Driven Ports (outbound) - the base channel and the header codec

pub mod inbound;
pub mod outbound;

pub use inbound::{CommApi, RecvOutcome};
pub use outbound::{BaseChannel, HeaderCodec};
