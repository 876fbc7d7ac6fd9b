//! Communicator roles and states

use std::fmt;

/// How a communicator was constructed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommRole {
    /// Short-lived channel that forwards every call to the base channel
    PassThrough,
    /// Listens on a request channel and replies through a response channel
    Server,
}

/// Observable state of a communicator
///
/// Derived from which channel slots are populated; never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    /// No request channel (pass-through, or torn down)
    Unbound,
    /// Request channel bound, nowhere to reply yet
    Listening,
    /// A response channel is bound to the most recent requester
    Addressed,
}

impl ServerState {
    /// State implied by the two channel slots
    pub fn from_slots(has_request: bool, has_response: bool) -> Self {
        match (has_request, has_response) {
            (false, _) => ServerState::Unbound,
            (true, false) => ServerState::Listening,
            (true, true) => ServerState::Addressed,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Unbound => f.write_str("unbound"),
            ServerState::Listening => f.write_str("listening"),
            ServerState::Addressed => f.write_str("addressed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_slots() {
        assert_eq!(ServerState::from_slots(false, false), ServerState::Unbound);
        assert_eq!(ServerState::from_slots(false, true), ServerState::Unbound);
        assert_eq!(ServerState::from_slots(true, false), ServerState::Listening);
        assert_eq!(ServerState::from_slots(true, true), ServerState::Addressed);
    }
}
