//! Inbound Ports (Driving Ports)
//!
//! The five operations a communicator exposes to its callers.

use crate::error::CommError;

/// What a successful `recv` delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A request of the given length; the reply address is now bound
    Request(usize),
    /// The end-of-stream sentinel of the given length
    EndOfStream(usize),
}

impl RecvOutcome {
    /// Number of bytes written into the caller's buffer
    pub fn len(&self) -> usize {
        match self {
            RecvOutcome::Request(n) | RecvOutcome::EndOfStream(n) => *n,
        }
    }

    /// True if nothing was received
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for the end-of-stream sentinel
    pub fn is_eof(&self) -> bool {
        matches!(self, RecvOutcome::EndOfStream(_))
    }
}

/// Primary communicator API (Driving Port)
pub trait CommApi {
    /// Bind the communicator's channels
    fn initialize(&mut self) -> Result<(), CommError>;

    /// Release every channel; calling it again is a no-op
    fn teardown(&mut self);

    /// Messages waiting on the inbound channel
    fn pending_count(&self) -> Result<usize, CommError>;

    /// Send a payload to the current responder
    ///
    /// # Returns
    /// Bytes accepted by the base channel
    fn send(&self, payload: &[u8]) -> Result<usize, CommError>;

    /// Receive one message into `buffer`
    ///
    /// A valid request rebinds the reply channel to the requester.
    fn recv(&mut self, buffer: &mut [u8]) -> Result<RecvOutcome, CommError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recv_outcome_len() {
        assert_eq!(RecvOutcome::Request(12).len(), 12);
        assert_eq!(RecvOutcome::EndOfStream(6).len(), 6);
        assert!(RecvOutcome::Request(0).is_empty());
    }

    #[test]
    fn test_recv_outcome_is_eof() {
        assert!(RecvOutcome::EndOfStream(6).is_eof());
        assert!(!RecvOutcome::Request(6).is_eof());
    }
}
