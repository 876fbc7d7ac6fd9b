//! Address/Channel Factory
//!
//! Derives request and response channel descriptors and drives the base
//! channel lifecycle (create address → initialize → teardown) for each.

use std::sync::Arc;

use tracing::{debug, error};

use crate::domain::{ChannelDescriptor, Direction, SerializerState, ServerCommConfig, TransportKind};
use crate::error::{ChannelError, CommError};
use crate::ports::BaseChannel;

/// Name prefix of a server's request channel
pub const REQUEST_CHANNEL_PREFIX: &str = "server_request.";

/// Name prefix of a server's response channel
pub const RESPONSE_CHANNEL_PREFIX: &str = "server_response.";

/// Deterministic request channel name for an address
pub fn request_channel_name(address: &str) -> String {
    format!("{REQUEST_CHANNEL_PREFIX}{address}")
}

/// Deterministic response channel name for a reply address
pub fn response_channel_name(address: &str) -> String {
    format!("{RESPONSE_CHANNEL_PREFIX}{address}")
}

/// Builds sub-channel descriptors and opens/closes them on the transport
pub struct ChannelFactory<B: BaseChannel> {
    transport: Arc<B>,
    kind: TransportKind,
}

impl<B: BaseChannel> ChannelFactory<B> {
    /// Create a factory stamping `kind` on every descriptor it builds
    pub fn new(transport: Arc<B>, kind: TransportKind) -> Self {
        Self { transport, kind }
    }

    /// The underlying base channel
    pub fn transport(&self) -> &B {
        &self.transport
    }

    /// Transport kind stamped on new descriptors
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Assign a fresh address to `channel`
    pub fn new_address(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError> {
        channel.kind = self.kind;
        self.transport.create_address(channel)?;
        debug!(address = %channel.address, kind = %self.kind, "Generated channel address");
        Ok(())
    }

    /// Descriptor of the receive-direction request channel for `config`
    ///
    /// An unnamed config binds its address (generating one if needed) and
    /// names the channel after it; a named config is resolved by name.
    pub fn request_descriptor(
        &self,
        config: &ServerCommConfig,
    ) -> Result<ChannelDescriptor, CommError> {
        let serializer = config.serializer.clone();

        if !config.name.is_empty() {
            return Ok(ChannelDescriptor::with_name(
                config.name.clone(),
                Direction::Recv,
                self.kind,
                serializer,
            ));
        }

        let mut channel = if config.needs_generated_address() {
            let mut channel =
                ChannelDescriptor::with_address("", Direction::Recv, self.kind, serializer);
            self.new_address(&mut channel)?;
            channel
        } else {
            ChannelDescriptor::with_address(
                config.address.clone(),
                Direction::Recv,
                self.kind,
                serializer,
            )
        };
        channel.name = request_channel_name(&channel.address);
        Ok(channel)
    }

    /// Descriptor of the send-direction channel replying to `response_address`
    pub fn response_descriptor(
        &self,
        response_address: &str,
        serializer: &SerializerState,
        always_send_header: bool,
    ) -> ChannelDescriptor {
        let mut channel = ChannelDescriptor::with_address(
            response_address,
            Direction::Send,
            self.kind,
            serializer.clone(),
        )
        .named(response_channel_name(response_address));
        channel.always_send_header = always_send_header;
        channel
    }

    /// Initialize `channel` on the transport
    pub fn open(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError> {
        match self.transport.initialize(channel) {
            Ok(()) => {
                debug!(
                    name = %channel.name,
                    address = %channel.address,
                    direction = %channel.direction,
                    "Channel initialized"
                );
                Ok(())
            }
            Err(e) => {
                error!(name = %channel.name, address = %channel.address, error = %e, "Channel initialization failed");
                Err(e)
            }
        }
    }

    /// Tear `channel` down on the transport
    pub fn close(&self, channel: &mut ChannelDescriptor) {
        self.transport.teardown(channel);
        debug!(name = %channel.name, address = %channel.address, "Channel torn down");
    }
}
