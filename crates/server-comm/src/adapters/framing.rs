//! Header framing decorator
//!
//! Wraps a base channel and honors `always_send_header`: outbound payloads on
//! such channels get a header naming the sending channel and the body size.
//! Everything else is passed through to the inner channel.

use std::sync::Arc;

use crate::domain::{ChannelDescriptor, HeaderFields, TransportKind};
use crate::error::ChannelError;
use crate::ports::{BaseChannel, HeaderCodec};

/// Base channel that frames outbound messages with a header on request
pub struct HeaderFramingChannel<B: BaseChannel, H: HeaderCodec> {
    inner: Arc<B>,
    codec: H,
}

impl<B: BaseChannel, H: HeaderCodec> HeaderFramingChannel<B, H> {
    pub fn new(inner: Arc<B>, codec: H) -> Self {
        Self { inner, codec }
    }

    /// The wrapped base channel
    pub fn inner(&self) -> &Arc<B> {
        &self.inner
    }
}

impl<B: BaseChannel, H: HeaderCodec> BaseChannel for HeaderFramingChannel<B, H> {
    fn kind(&self) -> TransportKind {
        self.inner.kind()
    }

    fn create_address(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError> {
        self.inner.create_address(channel)
    }

    fn initialize(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError> {
        self.inner.initialize(channel)
    }

    fn teardown(&self, channel: &mut ChannelDescriptor) {
        self.inner.teardown(channel)
    }

    fn pending_count(&self, channel: &ChannelDescriptor) -> Result<usize, ChannelError> {
        self.inner.pending_count(channel)
    }

    /// Returns the body length on success, not the framed length
    fn send(&self, channel: &ChannelDescriptor, payload: &[u8]) -> Result<usize, ChannelError> {
        if !channel.always_send_header {
            return self.inner.send(channel, payload);
        }

        let id = if channel.name.is_empty() {
            &channel.address
        } else {
            &channel.name
        };
        let fields = HeaderFields {
            id: id.clone(),
            ..HeaderFields::default()
        }
        .with_size(payload.len());
        self.inner.send(channel, &self.codec.encode(&fields, payload))?;
        Ok(payload.len())
    }

    fn receive(
        &self,
        channel: &ChannelDescriptor,
        buffer: &mut [u8],
    ) -> Result<usize, ChannelError> {
        self.inner.receive(channel, buffer)
    }
}
