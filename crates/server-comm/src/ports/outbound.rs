//! Outbound Ports (Driven Ports)
//!
//! The base channel and the header codec are external collaborators. The
//! communicator only ever talks to them through these traits, so tests can
//! inject recording doubles and several transports can coexist.

use crate::domain::{ChannelDescriptor, CommHeader, HeaderFields, TransportKind};
use crate::error::ChannelError;

/// Unidirectional named-channel transport (Driven Port)
///
/// Implementations must be safe to share between a requester thread and a
/// server thread; all blocking happens inside `receive`.
pub trait BaseChannel: Send + Sync {
    /// The transport kind this implementation serves
    fn kind(&self) -> TransportKind;

    /// Assign a fresh address to an uninitialized descriptor
    fn create_address(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError>;

    /// Bring a descriptor to a ready, usable state
    fn initialize(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError>;

    /// Release transport resources held by the descriptor
    ///
    /// Must be a no-op on a descriptor that was never initialized or was
    /// already torn down.
    fn teardown(&self, channel: &mut ChannelDescriptor);

    /// Number of queued inbound messages
    fn pending_count(&self, channel: &ChannelDescriptor) -> Result<usize, ChannelError>;

    /// Transmit one message; returns the number of bytes accepted
    fn send(&self, channel: &ChannelDescriptor, payload: &[u8]) -> Result<usize, ChannelError>;

    /// Read one message into `buffer`; returns its length
    ///
    /// The length must not exceed `buffer.len()`; callers report a larger
    /// value as `ChannelError::Transport`.
    fn receive(&self, channel: &ChannelDescriptor, buffer: &mut [u8])
        -> Result<usize, ChannelError>;
}

/// Message header codec (Driven Port)
pub trait HeaderCodec: Send + Sync {
    /// Parse the header of a raw message
    ///
    /// Never fails: an unparseable header is reported through
    /// `CommHeader::valid`.
    fn parse_header(&self, raw: &[u8]) -> CommHeader;

    /// True if `raw` is the end-of-stream sentinel
    fn is_eof(&self, raw: &[u8]) -> bool;

    /// Prefix `body` with a header carrying `fields`
    fn encode(&self, fields: &HeaderFields, body: &[u8]) -> Vec<u8>;
}
