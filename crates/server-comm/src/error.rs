//! Error types for the server communicator

use thiserror::Error;

use crate::domain::{Direction, TransportKind};

/// Errors reported by a base channel implementation.
///
/// These are propagated verbatim through [`CommError::Channel`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Channel {name:?} used before initialization")]
    NotInitialized { name: String },

    #[error("No address registered for channel name {0:?}")]
    UnknownName(String),

    #[error("No queue bound at address {0:?}")]
    UnknownAddress(String),

    #[error("Address {0:?} already has a receiver")]
    AddressInUse(String),

    #[error("Transport kind mismatch: channel is {channel:?}, transport is {transport:?}")]
    KindMismatch {
        channel: TransportKind,
        transport: TransportKind,
    },

    #[error("Cannot {operation} on a {direction} channel")]
    WrongDirection {
        operation: &'static str,
        direction: Direction,
    },

    #[error("Message too large: {size} > {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Receive buffer too small: message is {size} bytes, capacity {capacity}")]
    BufferTooSmall { size: usize, capacity: usize },

    #[error("Timed out waiting for a message on {0:?}")]
    Timeout(String),

    #[error("Channel at {0:?} is closed")]
    Closed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors that can occur in the server communicator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    #[error("No response channel registered")]
    NoResponder,

    #[error("No request channel registered")]
    NoRequestChannel,

    #[error("Error parsing message header")]
    InvalidHeader,

    #[error("No response address in message")]
    MissingResponseAddress,

    #[error("Could not initialize response channel ({received} request bytes received): {source}")]
    ResponseChannelInitFailed {
        /// Bytes of the request that were received before the failure.
        received: usize,
        #[source]
        source: ChannelError,
    },

    #[error("Communicator already initialized")]
    AlreadyInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl CommError {
    /// Negative status code for callers bridging to integer-status APIs.
    pub fn status_code(&self) -> i32 {
        match self {
            CommError::Channel(ChannelError::Timeout(_)) => -2,
            CommError::Channel(ChannelError::MessageTooLarge { .. })
            | CommError::Channel(ChannelError::BufferTooSmall { .. }) => -3,
            _ => -1,
        }
    }
}
