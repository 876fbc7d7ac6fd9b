//! # Server Communicator
//!
//! Request/reply messaging on top of unidirectional channels. A server
//! listens on one persistent request channel; every request carries a header
//! naming the requester's reply address, and the server rebinds a single
//! response channel to that address so `send` always answers the most recent
//! requester.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** Channel descriptors, headers, configuration, state
//! - **Ports Layer:** `CommApi` (driving), `BaseChannel` and `HeaderCodec` (driven)
//! - **Service Layer:** `ServerComm` with its request and response handlers
//! - **Adapters Layer:** In-memory transport, JSON header codec, header framing
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use server_comm::{
//!     CommApi, HeaderCodec, HeaderFields, InMemoryTransport, JsonHeaderCodec, RecvOutcome,
//!     ServerComm, ServerCommConfig, TransportKind,
//! };
//!
//! let transport = Arc::new(InMemoryTransport::new());
//! let config = ServerCommConfig::new("", "ep1", TransportKind::Memory).unwrap();
//! let mut server = ServerComm::bind(transport.clone(), JsonHeaderCodec::new(), config);
//! server.initialize().unwrap();
//!
//! // A requester writes to ep1 and expects the reply on ep2
//! let request = JsonHeaderCodec::new().encode(&HeaderFields::request("client7", "ep2"), b"ping");
//! transport.push("ep1", request.clone()).unwrap();
//!
//! let mut buf = [0u8; 512];
//! assert_eq!(server.recv(&mut buf).unwrap(), RecvOutcome::Request(request.len()));
//! assert_eq!(server.address(), "client7");
//!
//! server.send(b"pong").unwrap();
//! assert_eq!(transport.take("ep2"), Some(b"pong".to_vec()));
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Domain
pub use domain::{
    ChannelDescriptor, CommHeader, CommRole, Direction, HeaderFields, SerializerState,
    ServerCommConfig, ServerCommConfigBuilder, ServerState, TransportKind, EOF_SENTINEL,
    GENERATE_ADDRESS, MSG_HEAD_MARKER,
};

// Errors
pub use error::{ChannelError, CommError};

// Metrics
pub use metrics::{CommMetrics, MetricsSnapshot};

// Ports
pub use ports::{BaseChannel, CommApi, HeaderCodec, RecvOutcome};

// Service
pub use service::{
    request_channel_name, response_channel_name, ChannelFactory, ServerComm,
    REQUEST_CHANNEL_PREFIX, RESPONSE_CHANNEL_PREFIX,
};

// Adapters
pub use adapters::{HeaderFramingChannel, InMemoryTransport, JsonHeaderCodec, MemoryTransportConfig};
