//! Server Communicator
//!
//! Synthesizes request/reply on top of two unidirectional channels: a
//! persistent request channel the server listens on, and a response channel
//! rebound to whatever address the latest request header names.
//!
//! ```text
//!  requester ──(header: id, response_address)──▶ request channel ─┐
//!                                                                 │ recv
//!                                                           ┌─────▼─────┐
//!                                                           │ ServerComm│
//!                                                           └─────┬─────┘
//!  requester ◀──────────────── response channel ◀─────────────────┘ send
//! ```

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::domain::{
    ChannelDescriptor, CommRole, Direction, SerializerState, ServerCommConfig, ServerState,
    TransportKind,
};
use crate::error::{ChannelError, CommError};
use crate::metrics::CommMetrics;
use crate::ports::{BaseChannel, CommApi, HeaderCodec, RecvOutcome};
use crate::service::factory::ChannelFactory;
use crate::service::request::{received, Inbound, RequestHandler};
use crate::service::response::ResponseHandler;

/// Channel ownership per role
#[derive(Debug)]
enum Channels {
    PassThrough {
        channel: Option<ChannelDescriptor>,
    },
    Server {
        config: ServerCommConfig,
        request: RequestHandler,
        response: ResponseHandler,
    },
}

/// Server-side communicator
///
/// Built with [`ServerComm::bind`] for a listening server or
/// [`ServerComm::pass_through`] for a short-lived single channel. All
/// channels are released by [`CommApi::teardown`] or on drop.
pub struct ServerComm<B: BaseChannel, H: HeaderCodec> {
    name: String,
    address: String,
    direction: Direction,
    kind: TransportKind,
    serializer: SerializerState,
    always_send_header: bool,
    factory: ChannelFactory<B>,
    codec: H,
    channels: Channels,
    metrics: Arc<CommMetrics>,
}

impl<B: BaseChannel, H: HeaderCodec> ServerComm<B, H> {
    /// Server communicator listening on the channel described by `config`
    pub fn bind(transport: Arc<B>, codec: H, config: ServerCommConfig) -> Self {
        Self {
            name: config.name.clone(),
            address: config.address.clone(),
            direction: Direction::Recv,
            kind: config.kind,
            serializer: config.serializer.clone(),
            always_send_header: false,
            factory: ChannelFactory::new(transport, config.kind),
            codec,
            channels: Channels::Server {
                config,
                request: RequestHandler::new(),
                response: ResponseHandler::new(),
            },
            metrics: Arc::new(CommMetrics::new()),
        }
    }

    /// Temporary communicator forwarding every call to `channel`
    pub fn pass_through(transport: Arc<B>, codec: H, channel: ChannelDescriptor) -> Self {
        Self {
            name: channel.name.clone(),
            address: channel.address.clone(),
            direction: channel.direction,
            kind: channel.kind,
            serializer: channel.serializer.clone(),
            always_send_header: channel.always_send_header,
            factory: ChannelFactory::new(transport, channel.kind),
            codec,
            channels: Channels::PassThrough {
                channel: Some(channel),
            },
            metrics: Arc::new(CommMetrics::new()),
        }
    }

    /// Communicator name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current address; after a request, the id of the latest requester
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Direction of this communicator
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Transport kind threaded to every sub-channel
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Serializer configuration
    pub fn serializer(&self) -> &SerializerState {
        &self.serializer
    }

    /// Whether outbound messages always carry a header
    pub fn always_send_header(&self) -> bool {
        self.always_send_header
    }

    /// How this communicator was constructed
    pub fn role(&self) -> CommRole {
        match self.channels {
            Channels::PassThrough { .. } => CommRole::PassThrough,
            Channels::Server { .. } => CommRole::Server,
        }
    }

    /// Current state, derived from the channel slots
    pub fn state(&self) -> ServerState {
        ServerState::from_slots(
            self.request_channel().is_some(),
            self.response_channel().is_some(),
        )
    }

    /// The request channel of a bound server
    pub fn request_channel(&self) -> Option<&ChannelDescriptor> {
        match &self.channels {
            Channels::Server { request, .. } => request.channel(),
            Channels::PassThrough { .. } => None,
        }
    }

    /// The live response channel of a bound server
    pub fn response_channel(&self) -> Option<&ChannelDescriptor> {
        match &self.channels {
            Channels::Server { response, .. } => response.channel(),
            Channels::PassThrough { .. } => None,
        }
    }

    /// Activity counters
    pub fn metrics(&self) -> Arc<CommMetrics> {
        self.metrics.clone()
    }

    fn initialize_server(&mut self) -> Result<(), CommError> {
        let Channels::Server {
            config,
            request,
            response,
        } = &mut self.channels
        else {
            return Ok(());
        };

        if request.is_bound() {
            return Err(CommError::AlreadyInitialized);
        }

        let channel = self.factory.request_descriptor(config)?;
        debug!(name = %channel.name, address = %channel.address, "Binding request channel");
        request.bind(&self.factory, channel)?;

        self.direction = Direction::Recv;
        self.always_send_header = true;
        if response.release(&self.factory) {
            self.metrics.record_response_closed();
        }
        if let Some(channel) = request.channel() {
            if self.name.is_empty() {
                self.address = channel.address.clone();
            }
            info!(
                name = %channel.name,
                address = %channel.address,
                kind = %self.kind,
                "Server communicator listening"
            );
        }
        Ok(())
    }

    /// Replace the response channel with one bound to the latest requester
    fn rebind_response(&mut self, response_address: &str) -> Result<(), ChannelError> {
        let Channels::Server { response, .. } = &mut self.channels else {
            return Ok(());
        };

        if response.release(&self.factory) {
            self.metrics.record_response_closed();
        }

        let channel = self.factory.response_descriptor(
            response_address,
            &self.serializer,
            self.always_send_header,
        );
        response.bind(&self.factory, channel)?;
        self.metrics.record_response_opened();
        Ok(())
    }
}

impl<B: BaseChannel, H: HeaderCodec> CommApi for ServerComm<B, H> {
    fn initialize(&mut self) -> Result<(), CommError> {
        match &mut self.channels {
            Channels::PassThrough { channel } => {
                let channel = channel.as_mut().ok_or(CommError::NoRequestChannel)?;
                self.factory.open(channel)?;
                Ok(())
            }
            Channels::Server { .. } => self.initialize_server(),
        }
    }

    fn teardown(&mut self) {
        match &mut self.channels {
            Channels::PassThrough { channel } => {
                if let Some(mut channel) = channel.take() {
                    self.factory.close(&mut channel);
                }
            }
            Channels::Server {
                request, response, ..
            } => {
                request.release(&self.factory);
                if response.release(&self.factory) {
                    self.metrics.record_response_closed();
                }
            }
        }
    }

    fn pending_count(&self) -> Result<usize, CommError> {
        match &self.channels {
            Channels::PassThrough { channel } => {
                let channel = channel.as_ref().ok_or(CommError::NoRequestChannel)?;
                Ok(self.factory.transport().pending_count(channel)?)
            }
            Channels::Server { request, .. } => request.pending_count(&self.factory),
        }
    }

    fn send(&self, payload: &[u8]) -> Result<usize, CommError> {
        debug!(name = %self.name, bytes = payload.len(), "server send");
        let sent = match &self.channels {
            Channels::PassThrough { channel } => {
                let channel = channel.as_ref().ok_or(CommError::NoResponder)?;
                self.factory.transport().send(channel, payload)?
            }
            Channels::Server { response, .. } => response.send(&self.factory, payload)?,
        };
        self.metrics.record_reply(sent);
        Ok(sent)
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<RecvOutcome, CommError> {
        debug!(name = %self.name, "server recv");
        let inbound = match &self.channels {
            Channels::PassThrough { channel } => {
                let channel = channel.as_ref().ok_or(CommError::NoRequestChannel)?;
                let len = self.factory.transport().receive(channel, buffer)?;
                return Ok(if self.codec.is_eof(received(buffer, len)?) {
                    RecvOutcome::EndOfStream(len)
                } else {
                    RecvOutcome::Request(len)
                });
            }
            Channels::Server { request, .. } => {
                request.receive(&self.factory, &self.codec, buffer)
            }
        };

        let (len, header) = match inbound {
            Ok(Inbound::EndOfStream(len)) => {
                self.metrics.record_eof();
                return Ok(RecvOutcome::EndOfStream(len));
            }
            Ok(Inbound::Request { len, header }) => (len, header),
            Err(e @ (CommError::InvalidHeader | CommError::MissingResponseAddress)) => {
                self.metrics.record_header_rejected();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.address = header.id;
        self.metrics.record_request(len);
        if let Err(source) = self.rebind_response(&header.response_address) {
            error!(
                name = %self.name,
                response_address = %header.response_address,
                "Could not initialize response channel"
            );
            return Err(CommError::ResponseChannelInitFailed {
                received: len,
                source,
            });
        }

        Ok(RecvOutcome::Request(len))
    }
}

impl<B: BaseChannel, H: HeaderCodec> Drop for ServerComm<B, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryTransport, JsonHeaderCodec};
    use crate::domain::{HeaderFields, EOF_SENTINEL};

    fn server_on(address: &str) -> (ServerComm<InMemoryTransport, JsonHeaderCodec>, Arc<InMemoryTransport>) {
        let transport = Arc::new(InMemoryTransport::new());
        let config = ServerCommConfig::new("", address, TransportKind::Memory).unwrap();
        let mut server = ServerComm::bind(transport.clone(), JsonHeaderCodec::new(), config);
        server.initialize().unwrap();
        (server, transport)
    }

    fn request(id: &str, reply_to: &str, body: &[u8]) -> Vec<u8> {
        JsonHeaderCodec::new().encode(&HeaderFields::request(id, reply_to), body)
    }

    #[test]
    fn test_bind_names_request_channel_after_address() {
        let (server, _) = server_on("ep1");

        let req = server.request_channel().expect("request channel bound");
        assert_eq!(req.name, "server_request.ep1");
        assert_eq!(req.address, "ep1");
        assert_eq!(server.direction(), Direction::Recv);
        assert!(server.always_send_header());
        assert_eq!(server.role(), CommRole::Server);
        assert_eq!(server.state(), ServerState::Listening);
        assert!(server.response_channel().is_none());
    }

    #[test]
    fn test_bind_generates_address_when_empty() {
        let (server, transport) = server_on("");

        let req = server.request_channel().unwrap();
        assert!(!req.address.is_empty());
        assert_eq!(req.name, format!("server_request.{}", req.address));
        assert_eq!(server.address(), req.address);
        assert!(transport.has_queue(&req.address));
    }

    #[test]
    fn test_send_before_recv_fails() {
        let (server, _) = server_on("ep1");
        assert_eq!(server.send(b"early"), Err(CommError::NoResponder));
    }

    #[test]
    fn test_recv_binds_response_channel() {
        let (mut server, transport) = server_on("ep1");
        let msg = request("client7", "ep2", b"hello");
        transport.push("ep1", msg.clone()).unwrap();

        let mut buf = [0u8; 512];
        let outcome = server.recv(&mut buf).unwrap();

        assert_eq!(outcome, RecvOutcome::Request(msg.len()));
        assert_eq!(&buf[..msg.len()], msg.as_slice());
        assert_eq!(server.address(), "client7");
        let resp = server.response_channel().unwrap();
        assert_eq!(resp.name, "server_response.ep2");
        assert_eq!(resp.address, "ep2");
        assert!(resp.always_send_header);
        assert_eq!(server.state(), ServerState::Addressed);

        assert_eq!(server.send(b"world"), Ok(5));
        assert_eq!(transport.queued("ep2"), 1);
    }

    #[test]
    fn test_second_request_replaces_responder() {
        let (mut server, transport) = server_on("ep1");
        transport.push("ep1", request("a", "reply-a", b"1")).unwrap();
        transport.push("ep1", request("b", "reply-b", b"2")).unwrap();

        let mut buf = [0u8; 512];
        server.recv(&mut buf).unwrap();
        server.recv(&mut buf).unwrap();

        assert_eq!(server.response_channel().unwrap().address, "reply-b");
        let snap = server.metrics().snapshot();
        assert_eq!(snap.response_channels_opened, 2);
        assert_eq!(snap.response_channels_closed, 1);
        assert_eq!(server.metrics().live_response_channels(), 1);

        server.send(b"to-b").unwrap();
        assert_eq!(transport.queued("reply-a"), 0);
        assert_eq!(transport.queued("reply-b"), 1);
    }

    #[test]
    fn test_eof_leaves_state_alone() {
        let (mut server, transport) = server_on("ep1");
        transport.push("ep1", request("a", "reply-a", b"1")).unwrap();
        transport.push("ep1", EOF_SENTINEL.to_vec()).unwrap();

        let mut buf = [0u8; 512];
        server.recv(&mut buf).unwrap();
        let outcome = server.recv(&mut buf).unwrap();

        assert_eq!(outcome, RecvOutcome::EndOfStream(EOF_SENTINEL.len()));
        assert_eq!(server.address(), "a");
        assert_eq!(server.response_channel().unwrap().address, "reply-a");
        assert_eq!(server.metrics().snapshot().eof_received, 1);
    }

    #[test]
    fn test_invalid_header_leaves_slot() {
        let (mut server, transport) = server_on("ep1");
        transport.push("ep1", request("a", "reply-a", b"1")).unwrap();
        transport
            .push("ep1", b"CIS_MSG_HEAD{not json}CIS_MSG_HEADbody".to_vec())
            .unwrap();

        let mut buf = [0u8; 512];
        server.recv(&mut buf).unwrap();
        assert_eq!(server.recv(&mut buf), Err(CommError::InvalidHeader));

        assert_eq!(server.address(), "a");
        assert_eq!(server.response_channel().unwrap().address, "reply-a");
        assert_eq!(server.metrics().snapshot().headers_rejected, 1);
    }

    #[test]
    fn test_missing_response_address_leaves_slot() {
        let (mut server, transport) = server_on("ep1");
        transport.push("ep1", request("anon", "", b"1")).unwrap();

        let mut buf = [0u8; 512];
        assert_eq!(server.recv(&mut buf), Err(CommError::MissingResponseAddress));
        assert!(server.response_channel().is_none());
        assert_eq!(server.state(), ServerState::Listening);
    }

    #[test]
    fn test_pending_count_tracks_queue() {
        let (mut server, transport) = server_on("ep1");
        assert_eq!(server.pending_count(), Ok(0));

        transport.push("ep1", request("a", "r", b"1")).unwrap();
        transport.push("ep1", request("b", "r", b"2")).unwrap();
        assert_eq!(server.pending_count(), Ok(2));

        let mut buf = [0u8; 512];
        server.recv(&mut buf).unwrap();
        assert_eq!(server.pending_count(), Ok(1));
    }

    #[test]
    fn test_teardown_twice_is_noop() {
        let (mut server, transport) = server_on("ep1");
        transport.push("ep1", request("a", "reply-a", b"1")).unwrap();
        let mut buf = [0u8; 512];
        server.recv(&mut buf).unwrap();

        server.teardown();
        server.teardown();

        assert_eq!(server.state(), ServerState::Unbound);
        assert_eq!(server.send(b"x"), Err(CommError::NoResponder));
        assert_eq!(server.recv(&mut buf), Err(CommError::NoRequestChannel));
        assert_eq!(server.pending_count(), Err(CommError::NoRequestChannel));
        assert_eq!(server.metrics().live_response_channels(), 0);
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let (mut server, _) = server_on("ep1");
        assert_eq!(server.initialize(), Err(CommError::AlreadyInitialized));
    }

    #[test]
    fn test_named_server_resolves_through_registry() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.register_name("inbox", "ep-inbox");
        let config = ServerCommConfig::new("inbox", "", TransportKind::Memory).unwrap();
        let mut server = ServerComm::bind(transport.clone(), JsonHeaderCodec::new(), config);

        server.initialize().unwrap();
        let req = server.request_channel().unwrap();
        assert_eq!(req.name, "inbox");
        assert_eq!(req.address, "ep-inbox");
    }

    #[test]
    fn test_named_server_unknown_name_fails_but_tears_down() {
        let transport = Arc::new(InMemoryTransport::new());
        let config = ServerCommConfig::new("ghost", "", TransportKind::Memory).unwrap();
        let mut server = ServerComm::bind(transport.clone(), JsonHeaderCodec::new(), config);

        let result = server.initialize();
        assert_eq!(
            result,
            Err(CommError::Channel(ChannelError::UnknownName("ghost".into())))
        );
        assert!(!server.always_send_header());
        assert!(server.request_channel().is_some());

        server.teardown();
        assert!(server.request_channel().is_none());
        assert_eq!(transport.queue_count(), 0);
    }

    #[test]
    fn test_generated_address_failure_leaves_no_queue() {
        let transport = Arc::new(InMemoryTransport::new());
        let config = ServerCommConfig::new("", "", TransportKind::Ipc).unwrap();
        let mut server = ServerComm::bind(transport.clone(), JsonHeaderCodec::new(), config);

        assert!(matches!(
            server.initialize(),
            Err(CommError::Channel(ChannelError::KindMismatch { .. }))
        ));
        server.teardown();
        assert_eq!(transport.queue_count(), 0);
        assert_eq!(server.state(), ServerState::Unbound);
    }

    #[test]
    fn test_pass_through_forwards_to_base_channel() {
        let transport = Arc::new(InMemoryTransport::new());
        let outbound = ChannelDescriptor::with_address(
            "tmp",
            Direction::Send,
            TransportKind::Memory,
            SerializerState::default(),
        );
        let inbound = ChannelDescriptor::with_address(
            "tmp",
            Direction::Recv,
            TransportKind::Memory,
            SerializerState::default(),
        );
        let mut sender = ServerComm::pass_through(transport.clone(), JsonHeaderCodec::new(), outbound);
        let mut receiver = ServerComm::pass_through(transport.clone(), JsonHeaderCodec::new(), inbound);

        sender.initialize().unwrap();
        receiver.initialize().unwrap();
        assert_eq!(sender.role(), CommRole::PassThrough);
        assert_eq!(sender.state(), ServerState::Unbound);
        assert!(!sender.always_send_header());

        assert_eq!(sender.send(b"raw"), Ok(3));
        assert_eq!(sender.send(EOF_SENTINEL), Ok(EOF_SENTINEL.len()));
        assert_eq!(receiver.pending_count(), Ok(2));

        let mut buf = [0u8; 16];
        assert_eq!(receiver.recv(&mut buf), Ok(RecvOutcome::Request(3)));
        assert_eq!(&buf[..3], b"raw");
        assert_eq!(
            receiver.recv(&mut buf),
            Ok(RecvOutcome::EndOfStream(EOF_SENTINEL.len()))
        );
    }

    #[test]
    fn test_pass_through_after_teardown() {
        let transport = Arc::new(InMemoryTransport::new());
        let channel = ChannelDescriptor::with_address(
            "tmp",
            Direction::Send,
            TransportKind::Memory,
            SerializerState::default(),
        );
        let mut comm = ServerComm::pass_through(transport, JsonHeaderCodec::new(), channel);
        comm.initialize().unwrap();

        comm.teardown();
        comm.teardown();
        assert_eq!(comm.send(b"x"), Err(CommError::NoResponder));
        assert_eq!(comm.initialize(), Err(CommError::NoRequestChannel));
    }

    #[test]
    fn test_drop_releases_channels() {
        let transport = Arc::new(InMemoryTransport::new());
        {
            let config = ServerCommConfig::new("", "ep1", TransportKind::Memory).unwrap();
            let mut server = ServerComm::bind(transport.clone(), JsonHeaderCodec::new(), config);
            server.initialize().unwrap();
            assert!(transport.has_queue("ep1"));
        }
        assert!(!transport.has_queue("ep1"));
    }
}
