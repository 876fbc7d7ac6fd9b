//! Service Layer
//!
//! Orchestrates the three responsibilities of a server communicator:
//! - `factory`: derives sub-channel descriptors and drives their lifecycle
//! - `request`: receives and validates inbound requests
//! - `response`: owns the single reply channel
//!
//! `ServerComm` ties them together and implements `CommApi`.

pub mod factory;
pub mod request;
pub mod response;
pub mod server_comm;

pub use factory::{
    request_channel_name, response_channel_name, ChannelFactory, REQUEST_CHANNEL_PREFIX,
    RESPONSE_CHANNEL_PREFIX,
};
pub use request::{Inbound, RequestHandler};
pub use response::ResponseHandler;
pub use server_comm::ServerComm;
