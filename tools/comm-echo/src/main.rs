//! comm-echo: in-process request/reply demo
//!
//! Starts an echo server on the in-memory transport and drives it with
//! concurrent requesters, each listening on its own generated reply address.
//! The run ends with an end-of-stream message to the server.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use comm_telemetry::{comm_span, init_telemetry, log_event, TelemetryConfig};
use server_comm::{
    BaseChannel, ChannelDescriptor, ChannelError, CommApi, CommError, Direction, HeaderCodec,
    HeaderFields, HeaderFramingChannel, InMemoryTransport, JsonHeaderCodec, MemoryTransportConfig,
    MetricsSnapshot, RecvOutcome, SerializerState, ServerComm, ServerCommConfig, TransportKind,
    EOF_SENTINEL,
};
use tracing::{debug, info, warn};

/// comm-echo: exercise a server communicator end to end
#[derive(Parser, Debug)]
#[command(name = "comm-echo")]
#[command(about = "Run an in-process echo server and drive it with concurrent requesters")]
struct Args {
    /// Request channel address; overrides COMM_SERVER_ADDRESS ("generate" for a fresh one)
    #[arg(short, long)]
    address: Option<String>,

    /// Number of concurrent requesters
    #[arg(short, long, default_value = "3")]
    clients: usize,

    /// Requests sent by each requester
    #[arg(short, long, default_value = "5")]
    requests: usize,

    /// Receive timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    /// Largest message the transport accepts
    #[arg(long, default_value = "2048")]
    max_msg_size: usize,

    /// Attach a header to every reply
    #[arg(long)]
    framed: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _telemetry = init_telemetry(TelemetryConfig::from_env().with_service_name("comm-echo"))?;

    let mut config = ServerCommConfig::from_env().context("server configuration")?;
    if let Some(address) = args.address {
        config.address = address;
        config.validate()?;
    }
    if config.kind != TransportKind::Memory {
        bail!("comm-echo only runs on the memory transport, got {}", config.kind);
    }

    let transport = Arc::new(InMemoryTransport::with_config(
        MemoryTransportConfig::default()
            .with_recv_timeout(Duration::from_millis(args.timeout_ms))
            .with_max_msg_size(args.max_msg_size),
    ));
    if !config.name.is_empty() {
        let address = if config.address.is_empty() {
            format!("{}.queue", config.name)
        } else {
            config.address.clone()
        };
        transport.register_name(config.name.clone(), address);
    }

    let codec = JsonHeaderCodec::new();
    let (server_address, server) = if args.framed {
        let framing = Arc::new(HeaderFramingChannel::new(transport.clone(), codec));
        spawn_server(ServerComm::bind(framing, codec, config), args.max_msg_size)?
    } else {
        spawn_server(ServerComm::bind(transport.clone(), codec, config), args.max_msg_size)?
    };

    let clients: Vec<_> = (0..args.clients)
        .map(|client| {
            let transport = transport.clone();
            let server_address = server_address.clone();
            let (requests, buffer) = (args.requests, args.max_msg_size);
            thread::spawn(move || run_client(transport, server_address, client, requests, buffer))
        })
        .collect();

    let mut echoed = 0;
    let mut failed = 0;
    for (client, handle) in clients.into_iter().enumerate() {
        match join(handle) {
            Ok(n) => echoed += n,
            Err(e) => {
                warn!(client, error = %format!("{e:#}"), "Requester failed");
                failed += 1;
            }
        }
    }

    let mut closer = ServerComm::pass_through(
        transport.clone(),
        codec,
        ChannelDescriptor::with_address(
            server_address.clone(),
            Direction::Send,
            TransportKind::Memory,
            SerializerState::default(),
        ),
    );
    closer.initialize()?;
    closer.send(EOF_SENTINEL).context("sending end of stream")?;

    let snapshot = join(server)?;
    log_event!(
        info,
        "comm-echo",
        "Run complete",
        address = %server_address,
        echoed,
        requests = snapshot.requests_received,
        replies = snapshot.replies_sent,
        rejected = snapshot.headers_rejected
    );
    println!(
        "{} requests echoed by {} ({} requester(s) failed, {} messages through the transport)",
        echoed,
        server_address,
        failed,
        transport.messages_sent()
    );

    if failed > 0 {
        bail!("{failed} requester(s) failed");
    }
    Ok(())
}

fn join<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    handle.join().map_err(|_| anyhow!("worker thread panicked"))?
}

/// Initialize `server` and run it on its own thread until end of stream
fn spawn_server<B: BaseChannel + 'static>(
    mut server: ServerComm<B, JsonHeaderCodec>,
    buffer_size: usize,
) -> Result<(String, JoinHandle<Result<MetricsSnapshot>>)> {
    server.initialize().context("binding request channel")?;
    let address = server
        .request_channel()
        .map(|channel| channel.address.clone())
        .ok_or_else(|| anyhow!("server has no request channel"))?;
    info!(address = %address, state = %server.state(), "Echo server ready");

    let handle = thread::spawn(move || serve(server, buffer_size));
    Ok((address, handle))
}

fn serve<B: BaseChannel>(
    mut server: ServerComm<B, JsonHeaderCodec>,
    buffer_size: usize,
) -> Result<MetricsSnapshot> {
    let _span = comm_span!("serve", component = "echo-server", name = %server.name()).entered();
    let codec = JsonHeaderCodec::new();
    let mut buf = vec![0u8; buffer_size];

    loop {
        match server.recv(&mut buf) {
            Ok(RecvOutcome::EndOfStream(_)) => break,
            Ok(RecvOutcome::Request(len)) => {
                let raw = &buf[..len];
                let body = codec.parse_header(raw).body(raw);
                debug!(requester = %server.address(), bytes = body.len(), "Echoing request");
                server.send(body).context("sending reply")?;
            }
            Err(CommError::Channel(ChannelError::Timeout(_))) => continue,
            Err(
                e @ (CommError::InvalidHeader
                | CommError::MissingResponseAddress
                | CommError::ResponseChannelInitFailed { .. }),
            ) => {
                warn!(error = %e, code = e.status_code(), "Dropping request");
            }
            Err(e) => return Err(e).context("request channel failed"),
        }
    }

    let snapshot = server.metrics().snapshot();
    server.teardown();
    Ok(snapshot)
}

fn run_client(
    transport: Arc<InMemoryTransport>,
    server_address: String,
    client: usize,
    requests: usize,
    buffer_size: usize,
) -> Result<usize> {
    let codec = JsonHeaderCodec::new();
    let id = format!("client-{client}");

    let mut inbox = ChannelDescriptor::with_address(
        "",
        Direction::Recv,
        TransportKind::Memory,
        SerializerState::default(),
    );
    transport.create_address(&mut inbox)?;
    let reply_to = inbox.address.clone();
    let mut replies = ServerComm::pass_through(transport.clone(), codec, inbox.named(id.clone()));
    replies.initialize().context("opening reply channel")?;

    let outbox = ChannelDescriptor::with_address(
        server_address,
        Direction::Send,
        TransportKind::Memory,
        SerializerState::default(),
    )
    .named(id.clone());
    let mut requester = ServerComm::pass_through(transport, codec, outbox);
    requester.initialize().context("connecting to server")?;

    let mut buf = vec![0u8; buffer_size];
    for n in 0..requests {
        let body = format!("{id} request {n}");
        let request = codec.encode(&HeaderFields::request(id.clone(), reply_to.clone()), body.as_bytes());
        requester.send(&request)?;

        let len = replies.recv(&mut buf)?.len();
        let raw = &buf[..len];
        if codec.parse_header(raw).body(raw) != body.as_bytes() {
            bail!("{id} got a reply for another request");
        }
    }
    debug!(client = %id, requests, "Requester done");
    Ok(requests)
}
