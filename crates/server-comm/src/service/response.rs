//! Response Handler
//!
//! Owns the single response channel slot. Every accepted request replaces
//! the slot's channel; replies always go to the most recent requester.

use tracing::{debug, error};

use crate::domain::ChannelDescriptor;
use crate::error::{ChannelError, CommError};
use crate::ports::BaseChannel;
use crate::service::factory::ChannelFactory;

/// Holder of the response channel slot
#[derive(Debug, Default)]
pub struct ResponseHandler {
    slot: Option<ChannelDescriptor>,
}

impl ResponseHandler {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// The live response channel, if any
    pub fn channel(&self) -> Option<&ChannelDescriptor> {
        self.slot.as_ref()
    }

    /// Initialize `channel` and install it in the slot
    ///
    /// The slot must already be empty (see [`ResponseHandler::release`]).
    /// On failure the half-built channel is torn down and the slot stays
    /// empty.
    pub fn bind<B: BaseChannel>(
        &mut self,
        factory: &ChannelFactory<B>,
        mut channel: ChannelDescriptor,
    ) -> Result<(), ChannelError> {
        debug_assert!(self.slot.is_none(), "response slot must be released first");

        if let Err(e) = factory.open(&mut channel) {
            factory.close(&mut channel);
            return Err(e);
        }
        self.slot = Some(channel);
        Ok(())
    }

    /// Send `payload` on the live response channel
    pub fn send<B: BaseChannel>(
        &self,
        factory: &ChannelFactory<B>,
        payload: &[u8],
    ) -> Result<usize, CommError> {
        let Some(channel) = self.slot.as_ref() else {
            error!("No response channel registered");
            return Err(CommError::NoResponder);
        };

        let sent = factory.transport().send(channel, payload)?;
        debug!(address = %channel.address, bytes = sent, "Reply sent");
        Ok(sent)
    }

    /// Tear down and drop the live channel; returns whether one was held
    pub fn release<B: BaseChannel>(&mut self, factory: &ChannelFactory<B>) -> bool {
        match self.slot.take() {
            Some(mut channel) => {
                factory.close(&mut channel);
                true
            }
            None => false,
        }
    }
}
