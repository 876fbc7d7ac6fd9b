//! Channel descriptors
//!
//! A `ChannelDescriptor` is the value handed to a base channel: it names a
//! unidirectional endpoint but holds no transport resources itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a unidirectional channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outbound: messages are written to the address
    Send,
    /// Inbound: messages are read from the address
    Recv,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("send"),
            Direction::Recv => f.write_str("recv"),
        }
    }
}

/// Transport tag carried by every descriptor
///
/// A base channel only accepts descriptors of its own kind, which lets
/// several transports coexist in one process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Process-local queues (the default transport)
    #[default]
    Memory,
    /// System V message queues
    Ipc,
    /// ZeroMQ sockets
    Zmq,
    /// RabbitMQ queues
    Rmq,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Memory => "memory",
            TransportKind::Ipc => "ipc",
            TransportKind::Zmq => "zmq",
            TransportKind::Rmq => "rmq",
        };
        f.write_str(s)
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "default" => Ok(TransportKind::Memory),
            "ipc" => Ok(TransportKind::Ipc),
            "zmq" => Ok(TransportKind::Zmq),
            "rmq" => Ok(TransportKind::Rmq),
            other => Err(format!("unknown transport kind: {other}")),
        }
    }
}

/// Opaque serializer configuration passed through to the base channel
///
/// Never interpreted here; sub-channels receive their own clone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerState(pub Option<String>);

impl SerializerState {
    /// Serializer state carrying a format string
    pub fn new(format: impl Into<String>) -> Self {
        Self(Some(format.into()))
    }

    /// The format string, if any
    pub fn format(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Descriptor of one unidirectional channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Channel name (may be empty)
    pub name: String,
    /// Transport address (may be empty until resolved or generated)
    pub address: String,
    /// Send or receive
    pub direction: Direction,
    /// Transport tag
    pub kind: TransportKind,
    /// Opaque serializer configuration
    pub serializer: SerializerState,
    /// Ask the base layer to attach a header to every outbound message
    pub always_send_header: bool,
    /// Set by the base channel once transport resources are held
    pub initialized: bool,
}

impl ChannelDescriptor {
    /// Build a descriptor for a known address
    pub fn with_address(
        address: impl Into<String>,
        direction: Direction,
        kind: TransportKind,
        serializer: SerializerState,
    ) -> Self {
        Self {
            name: String::new(),
            address: address.into(),
            direction,
            kind,
            serializer,
            always_send_header: false,
            initialized: false,
        }
    }

    /// Build a descriptor whose address the base channel resolves from the name
    pub fn with_name(
        name: impl Into<String>,
        direction: Direction,
        kind: TransportKind,
        serializer: SerializerState,
    ) -> Self {
        Self {
            name: name.into(),
            address: String::new(),
            direction,
            kind,
            serializer,
            always_send_header: false,
            initialized: false,
        }
    }

    /// Builder-style method to set the name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
