//! Request Handler
//!
//! Owns the persistent inbound channel. Receives raw messages, spots the
//! end-of-stream sentinel and validates the header of everything else.

use tracing::{debug, error};

use crate::domain::{ChannelDescriptor, CommHeader};
use crate::error::{ChannelError, CommError};
use crate::ports::{BaseChannel, HeaderCodec};
use crate::service::factory::ChannelFactory;

/// A message accepted from the request channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// End-of-stream sentinel; carries no header
    EndOfStream(usize),
    /// A request whose header names a reply address
    Request { len: usize, header: CommHeader },
}

/// The first `len` bytes of `buffer`, as reported by a base channel receive
pub(crate) fn received(buffer: &[u8], len: usize) -> Result<&[u8], ChannelError> {
    buffer.get(..len).ok_or_else(|| {
        ChannelError::Transport(format!(
            "receive reported {len} bytes into a {}-byte buffer",
            buffer.len()
        ))
    })
}

/// Holder of the request channel slot
#[derive(Debug, Default)]
pub struct RequestHandler {
    channel: Option<ChannelDescriptor>,
}

impl RequestHandler {
    /// Empty handler (no request channel)
    pub fn new() -> Self {
        Self::default()
    }

    /// The request channel, if bound
    pub fn channel(&self) -> Option<&ChannelDescriptor> {
        self.channel.as_ref()
    }

    /// Whether a request channel is held
    pub fn is_bound(&self) -> bool {
        self.channel.is_some()
    }

    /// Store `channel` and initialize it
    ///
    /// The descriptor is kept even when initialization fails so that
    /// `release` can still reach it.
    pub fn bind<B: BaseChannel>(
        &mut self,
        factory: &ChannelFactory<B>,
        channel: ChannelDescriptor,
    ) -> Result<(), CommError> {
        let channel = self.channel.insert(channel);
        factory.open(channel)?;
        Ok(())
    }

    /// Messages queued on the request channel
    pub fn pending_count<B: BaseChannel>(
        &self,
        factory: &ChannelFactory<B>,
    ) -> Result<usize, CommError> {
        let channel = self.channel.as_ref().ok_or(CommError::NoRequestChannel)?;
        Ok(factory.transport().pending_count(channel)?)
    }

    /// Receive one message and classify it
    pub fn receive<B: BaseChannel, H: HeaderCodec>(
        &self,
        factory: &ChannelFactory<B>,
        codec: &H,
        buffer: &mut [u8],
    ) -> Result<Inbound, CommError> {
        let Some(channel) = self.channel.as_ref() else {
            error!("Receive on server without a request channel");
            return Err(CommError::NoRequestChannel);
        };

        let len = factory.transport().receive(channel, buffer)?;
        let raw = received(buffer, len)?;

        if codec.is_eof(raw) {
            debug!(name = %channel.name, "End of stream received");
            return Ok(Inbound::EndOfStream(len));
        }

        let header = codec.parse_header(raw);
        if !header.valid {
            error!(name = %channel.name, "Error parsing header");
            return Err(CommError::InvalidHeader);
        }
        if !header.has_response_address() {
            error!(name = %channel.name, id = %header.id, "No response address in message");
            return Err(CommError::MissingResponseAddress);
        }

        debug!(
            name = %channel.name,
            id = %header.id,
            response_address = %header.response_address,
            bytes = len,
            "Request received"
        );
        Ok(Inbound::Request { len, header })
    }

    /// Tear down and drop the request channel; returns whether one was held
    pub fn release<B: BaseChannel>(&mut self, factory: &ChannelFactory<B>) -> bool {
        match self.channel.take() {
            Some(mut channel) => {
                factory.close(&mut channel);
                true
            }
            None => false,
        }
    }
}
