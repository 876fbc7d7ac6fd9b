//! Server communicator configuration
//!
//! # Example
//!
//! ```ignore
//! use server_comm::domain::ServerCommConfigBuilder;
//!
//! let config = ServerCommConfigBuilder::new()
//!     .address("ep1")
//!     .serializer("%s")
//!     .build()
//!     .expect("Valid config");
//! ```

use crate::domain::channel::{SerializerState, TransportKind};
use crate::error::CommError;
use serde::{Deserialize, Serialize};
use std::env;

/// Address literal asking the transport to generate a fresh address
pub const GENERATE_ADDRESS: &str = "generate";

/// Configuration of a bound server communicator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCommConfig {
    /// Request channel name; empty means "derive from the address"
    pub name: String,
    /// Request channel address; empty or `generate` means "create one"
    pub address: String,
    /// Transport tag for every sub-channel
    pub kind: TransportKind,
    /// Serializer configuration cloned into every sub-channel
    pub serializer: SerializerState,
}

impl ServerCommConfig {
    /// Create a new configuration with validation
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        kind: TransportKind,
    ) -> Result<Self, CommError> {
        let config = Self {
            name: name.into(),
            address: address.into(),
            kind,
            serializer: SerializerState::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables.
    ///
    /// - `COMM_SERVER_NAME`: request channel name (default: empty)
    /// - `COMM_SERVER_ADDRESS`: request channel address (default: empty)
    /// - `COMM_TRANSPORT`: transport kind (default: memory)
    /// - `COMM_SERIALIZER`: serializer format string (default: none)
    pub fn from_env() -> Result<Self, CommError> {
        let kind = match env::var("COMM_TRANSPORT") {
            Ok(v) => v.parse().map_err(CommError::InvalidConfig)?,
            Err(_) => TransportKind::default(),
        };

        let config = Self {
            name: env::var("COMM_SERVER_NAME").unwrap_or_default(),
            address: env::var("COMM_SERVER_ADDRESS").unwrap_or_default(),
            kind,
            serializer: SerializerState(env::var("COMM_SERIALIZER").ok()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject names and addresses that could not survive a header round trip
    pub fn validate(&self) -> Result<(), CommError> {
        for (field, value) in [("name", &self.name), ("address", &self.address)] {
            if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(CommError::InvalidConfig(format!(
                    "{field} must not contain whitespace: {value:?}"
                )));
            }
        }
        Ok(())
    }

    /// True when the transport must generate the request address
    pub fn needs_generated_address(&self) -> bool {
        self.name.is_empty() && (self.address.is_empty() || self.address == GENERATE_ADDRESS)
    }

    /// Builder-style method to set the serializer
    pub fn with_serializer(mut self, serializer: SerializerState) -> Self {
        self.serializer = serializer;
        self
    }
}

/// Builder for ServerCommConfig with validation
#[derive(Default)]
pub struct ServerCommConfigBuilder {
    name: Option<String>,
    address: Option<String>,
    kind: Option<TransportKind>,
    serializer: Option<SerializerState>,
}

impl ServerCommConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request channel name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the request channel address
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set the transport kind
    pub fn kind(mut self, kind: TransportKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the serializer format
    pub fn serializer(mut self, format: impl Into<String>) -> Self {
        self.serializer = Some(SerializerState::new(format));
        self
    }

    /// Build the ServerCommConfig, validating all parameters
    pub fn build(self) -> Result<ServerCommConfig, CommError> {
        let config = ServerCommConfig {
            name: self.name.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            serializer: self.serializer.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}
