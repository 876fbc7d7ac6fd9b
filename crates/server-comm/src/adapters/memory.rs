//! In-memory base channel
//!
//! Process-local message queues keyed by address. Suitable for tests and for
//! wiring a requester and a server inside one process; cross-process
//! deployments would use a different `BaseChannel` implementation.
//!
//! Queue semantics:
//! - A receive-direction channel owns its queue: initializing it creates the
//!   queue, tearing it down removes the queue and wakes blocked readers.
//!   Only one receiver may be open per address.
//! - A send-direction channel only connects to a queue.
//! - Messages are bounded by `max_msg_size`; a receive buffer that is too
//!   small leaves the message at the head of the queue.

use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{ChannelDescriptor, Direction, TransportKind, GENERATE_ADDRESS};
use crate::error::ChannelError;
use crate::ports::BaseChannel;

/// Default maximum message size in bytes
pub const DEFAULT_MAX_MSG_SIZE: usize = 2048;

/// Default time a receive blocks on an empty queue
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of an [`InMemoryTransport`]
#[derive(Clone, Debug)]
pub struct MemoryTransportConfig {
    /// Largest message accepted by `send`
    pub max_msg_size: usize,
    /// How long `receive` waits for a message
    pub recv_timeout: Duration,
    /// Create the queue when a send channel connects to an unknown address
    pub create_on_connect: bool,
}

impl Default for MemoryTransportConfig {
    fn default() -> Self {
        Self {
            max_msg_size: DEFAULT_MAX_MSG_SIZE,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            create_on_connect: true,
        }
    }
}

impl MemoryTransportConfig {
    /// Builder-style method to set the receive timeout
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Builder-style method to set the maximum message size
    pub fn with_max_msg_size(mut self, size: usize) -> Self {
        self.max_msg_size = size;
        self
    }

    /// Builder-style method to require existing queues for send channels
    pub fn strict_connect(mut self) -> Self {
        self.create_on_connect = false;
        self
    }
}

/// Process-local implementation of [`BaseChannel`]
pub struct InMemoryTransport {
    kind: TransportKind,
    config: MemoryTransportConfig,
    /// Queued messages by address
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    /// Addresses with an open receive channel; locked before `queues`
    receivers: Mutex<HashSet<String>>,
    /// Signalled whenever a queue gains a message or is removed
    ready: Condvar,
    /// Name → address registry used to resolve named channels
    names: RwLock<HashMap<String, String>>,
    /// Total messages sent through this transport
    messages_sent: AtomicU64,
}

impl InMemoryTransport {
    /// Memory transport with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryTransportConfig::default())
    }

    /// Memory transport with custom configuration
    #[must_use]
    pub fn with_config(config: MemoryTransportConfig) -> Self {
        Self::for_kind(TransportKind::Memory, config)
    }

    /// Queue transport answering to another transport kind
    #[must_use]
    pub fn for_kind(kind: TransportKind, config: MemoryTransportConfig) -> Self {
        Self {
            kind,
            config,
            queues: Mutex::new(HashMap::new()),
            receivers: Mutex::new(HashSet::new()),
            ready: Condvar::new(),
            names: RwLock::new(HashMap::new()),
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Transport configuration
    pub fn config(&self) -> &MemoryTransportConfig {
        &self.config
    }

    /// Make `name` resolve to `address` for name-only descriptors
    pub fn register_name(&self, name: impl Into<String>, address: impl Into<String>) {
        self.names.write().insert(name.into(), address.into());
    }

    /// Address registered for `name`
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        self.names.read().get(name).cloned()
    }

    /// Enqueue a raw message at `address`, bypassing any descriptor
    pub fn push(&self, address: &str, message: Vec<u8>) -> Result<(), ChannelError> {
        self.check_size(message.len())?;
        let mut queues = self.queues.lock();
        let queue = match queues.get_mut(address) {
            Some(queue) => queue,
            None if self.config.create_on_connect => queues.entry(address.to_string()).or_default(),
            None => return Err(ChannelError::UnknownAddress(address.to_string())),
        };
        queue.push_back(message);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_all();
        Ok(())
    }

    /// Dequeue the head message at `address` without blocking
    pub fn take(&self, address: &str) -> Option<Vec<u8>> {
        self.queues.lock().get_mut(address)?.pop_front()
    }

    /// Messages queued at `address` (zero for unknown addresses)
    pub fn queued(&self, address: &str) -> usize {
        self.queues.lock().get(address).map_or(0, VecDeque::len)
    }

    /// Whether a queue exists at `address`
    pub fn has_queue(&self, address: &str) -> bool {
        self.queues.lock().contains_key(address)
    }

    /// Number of live queues
    pub fn queue_count(&self) -> usize {
        self.queues.lock().len()
    }

    /// Drop all messages queued at `address`; returns how many were dropped
    pub fn purge(&self, address: &str) -> usize {
        let mut queues = self.queues.lock();
        let dropped = queues.get_mut(address).map_or(0, |q| {
            let n = q.len();
            q.clear();
            n
        });
        if dropped > 0 {
            debug!(address = %address, dropped, "Purged queue");
        }
        dropped
    }

    /// Delete the queue at `address`; returns whether it existed
    pub fn remove_queue(&self, address: &str) -> bool {
        let removed = self.queues.lock().remove(address).is_some();
        if removed {
            self.ready.notify_all();
        }
        removed
    }

    /// Total messages enqueued through this transport
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    fn check_size(&self, size: usize) -> Result<(), ChannelError> {
        if size > self.config.max_msg_size {
            return Err(ChannelError::MessageTooLarge {
                size,
                max: self.config.max_msg_size,
            });
        }
        Ok(())
    }

    fn check_kind(&self, channel: &ChannelDescriptor) -> Result<(), ChannelError> {
        if channel.kind != self.kind {
            return Err(ChannelError::KindMismatch {
                channel: channel.kind,
                transport: self.kind,
            });
        }
        Ok(())
    }

    fn check_ready(
        &self,
        channel: &ChannelDescriptor,
        operation: &'static str,
        direction: Direction,
    ) -> Result<(), ChannelError> {
        if !channel.initialized {
            return Err(ChannelError::NotInitialized {
                name: channel.name.clone(),
            });
        }
        if channel.direction != direction {
            return Err(ChannelError::WrongDirection {
                operation,
                direction: channel.direction,
            });
        }
        Ok(())
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseChannel for InMemoryTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn create_address(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError> {
        self.check_kind(channel)?;
        let address = Uuid::new_v4().simple().to_string();
        self.queues.lock().insert(address.clone(), VecDeque::new());
        channel.address = address;
        Ok(())
    }

    fn initialize(&self, channel: &mut ChannelDescriptor) -> Result<(), ChannelError> {
        self.check_kind(channel)?;

        if channel.address.is_empty() {
            channel.address = self
                .resolve_name(&channel.name)
                .ok_or_else(|| ChannelError::UnknownName(channel.name.clone()))?;
        } else if channel.address == GENERATE_ADDRESS {
            self.create_address(channel)?;
        }

        {
            let mut receivers = self.receivers.lock();
            if channel.direction == Direction::Recv && receivers.contains(&channel.address) {
                return Err(ChannelError::AddressInUse(channel.address.clone()));
            }
            let mut queues = self.queues.lock();
            if !queues.contains_key(&channel.address) {
                if channel.direction == Direction::Send && !self.config.create_on_connect {
                    return Err(ChannelError::UnknownAddress(channel.address.clone()));
                }
                queues.insert(channel.address.clone(), VecDeque::new());
            }
            if channel.direction == Direction::Recv {
                receivers.insert(channel.address.clone());
            }
        }

        channel.initialized = true;
        Ok(())
    }

    fn teardown(&self, channel: &mut ChannelDescriptor) {
        if !channel.initialized {
            return;
        }
        channel.initialized = false;

        if channel.direction == Direction::Recv {
            let mut receivers = self.receivers.lock();
            receivers.remove(&channel.address);
            let leftover = self
                .queues
                .lock()
                .remove(&channel.address)
                .map_or(0, |q| q.len());
            drop(receivers);
            if leftover > 0 {
                warn!(address = %channel.address, leftover, "Removed queue with unread messages");
            }
            self.ready.notify_all();
        }
    }

    fn pending_count(&self, channel: &ChannelDescriptor) -> Result<usize, ChannelError> {
        if !channel.initialized {
            return Err(ChannelError::NotInitialized {
                name: channel.name.clone(),
            });
        }
        self.queues
            .lock()
            .get(&channel.address)
            .map(VecDeque::len)
            .ok_or_else(|| ChannelError::Closed(channel.address.clone()))
    }

    fn send(&self, channel: &ChannelDescriptor, payload: &[u8]) -> Result<usize, ChannelError> {
        self.check_ready(channel, "send", Direction::Send)?;
        self.check_size(payload.len())?;

        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(&channel.address)
            .ok_or_else(|| ChannelError::Closed(channel.address.clone()))?;
        queue.push_back(payload.to_vec());
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_all();
        Ok(payload.len())
    }

    fn receive(
        &self,
        channel: &ChannelDescriptor,
        buffer: &mut [u8],
    ) -> Result<usize, ChannelError> {
        self.check_ready(channel, "receive", Direction::Recv)?;

        let deadline = Instant::now() + self.config.recv_timeout;
        let mut queues = self.queues.lock();
        loop {
            let queue = queues
                .get_mut(&channel.address)
                .ok_or_else(|| ChannelError::Closed(channel.address.clone()))?;

            if let Some(message) = queue.pop_front() {
                if message.len() > buffer.len() {
                    let size = message.len();
                    queue.push_front(message);
                    return Err(ChannelError::BufferTooSmall {
                        size,
                        capacity: buffer.len(),
                    });
                }
                buffer[..message.len()].copy_from_slice(&message);
                return Ok(message.len());
            }

            if Instant::now() >= deadline {
                return Err(ChannelError::Timeout(channel.address.clone()));
            }
            self.ready.wait_until(&mut queues, deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SerializerState;
    use std::sync::Arc;
    use std::thread;

    fn descriptor(address: &str, direction: Direction) -> ChannelDescriptor {
        ChannelDescriptor::with_address(
            address,
            direction,
            TransportKind::Memory,
            SerializerState::default(),
        )
    }

    fn open(transport: &InMemoryTransport, address: &str, direction: Direction) -> ChannelDescriptor {
        let mut desc = descriptor(address, direction);
        transport.initialize(&mut desc).unwrap();
        desc
    }

    #[test]
    fn test_create_address_is_unique() {
        let transport = InMemoryTransport::new();
        let mut a = descriptor("", Direction::Recv);
        let mut b = descriptor("", Direction::Recv);
        transport.create_address(&mut a).unwrap();
        transport.create_address(&mut b).unwrap();

        assert_ne!(a.address, b.address);
        assert_eq!(transport.queue_count(), 2);
    }

    #[test]
    fn test_generate_literal_creates_address() {
        let transport = InMemoryTransport::new();
        let desc = open(&transport, GENERATE_ADDRESS, Direction::Recv);
        assert_ne!(desc.address, GENERATE_ADDRESS);
        assert!(transport.has_queue(&desc.address));
    }

    #[test]
    fn test_send_then_receive() {
        let transport = InMemoryTransport::new();
        let rx = open(&transport, "q", Direction::Recv);
        let tx = open(&transport, "q", Direction::Send);

        assert_eq!(transport.send(&tx, b"hello"), Ok(5));
        assert_eq!(transport.pending_count(&rx), Ok(1));

        let mut buf = [0u8; 16];
        assert_eq!(transport.receive(&rx, &mut buf), Ok(5));
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(transport.messages_sent(), 1);
    }

    #[test]
    fn test_wrong_direction_rejected() {
        let transport = InMemoryTransport::new();
        let rx = open(&transport, "q", Direction::Recv);
        let tx = open(&transport, "q", Direction::Send);

        assert!(matches!(
            transport.send(&rx, b"x"),
            Err(ChannelError::WrongDirection { .. })
        ));
        let mut buf = [0u8; 4];
        assert!(matches!(
            transport.receive(&tx, &mut buf),
            Err(ChannelError::WrongDirection { .. })
        ));
    }

    #[test]
    fn test_uninitialized_channel_rejected() {
        let transport = InMemoryTransport::new();
        let tx = descriptor("q", Direction::Send);
        assert!(matches!(
            transport.send(&tx, b"x"),
            Err(ChannelError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let transport = InMemoryTransport::for_kind(TransportKind::Ipc, Default::default());
        let mut desc = descriptor("q", Direction::Recv);

        assert_eq!(
            transport.initialize(&mut desc),
            Err(ChannelError::KindMismatch {
                channel: TransportKind::Memory,
                transport: TransportKind::Ipc,
            })
        );
        assert!(!desc.initialized);
    }

    #[test]
    fn test_message_too_large() {
        let transport =
            InMemoryTransport::with_config(MemoryTransportConfig::default().with_max_msg_size(4));
        let _rx = open(&transport, "q", Direction::Recv);
        let tx = open(&transport, "q", Direction::Send);

        assert_eq!(
            transport.send(&tx, b"too long"),
            Err(ChannelError::MessageTooLarge { size: 8, max: 4 })
        );
    }

    #[test]
    fn test_small_buffer_keeps_message() {
        let transport = InMemoryTransport::new();
        let rx = open(&transport, "q", Direction::Recv);
        transport.push("q", b"abcdef".to_vec()).unwrap();

        let mut small = [0u8; 3];
        assert_eq!(
            transport.receive(&rx, &mut small),
            Err(ChannelError::BufferTooSmall {
                size: 6,
                capacity: 3
            })
        );
        assert_eq!(transport.queued("q"), 1);

        let mut big = [0u8; 6];
        assert_eq!(transport.receive(&rx, &mut big), Ok(6));
    }

    #[test]
    fn test_receive_times_out() {
        let transport = InMemoryTransport::with_config(
            MemoryTransportConfig::default().with_recv_timeout(Duration::from_millis(10)),
        );
        let rx = open(&transport, "q", Direction::Recv);

        let mut buf = [0u8; 4];
        assert_eq!(
            transport.receive(&rx, &mut buf),
            Err(ChannelError::Timeout("q".into()))
        );
    }

    #[test]
    fn test_receive_blocks_until_send() {
        let transport = Arc::new(InMemoryTransport::new());
        let rx = open(&transport, "q", Direction::Recv);
        let tx = open(&transport, "q", Direction::Send);

        let sender = {
            let transport = transport.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                transport.send(&tx, b"late").unwrap();
            })
        };

        let mut buf = [0u8; 8];
        assert_eq!(transport.receive(&rx, &mut buf), Ok(4));
        sender.join().unwrap();
    }

    #[test]
    fn test_teardown_recv_removes_queue() {
        let transport = InMemoryTransport::new();
        let mut rx = open(&transport, "q", Direction::Recv);
        let mut tx = open(&transport, "q", Direction::Send);

        transport.teardown(&mut tx);
        assert!(transport.has_queue("q"));

        transport.teardown(&mut rx);
        transport.teardown(&mut rx);
        assert!(!transport.has_queue("q"));
        assert!(!rx.initialized);
    }

    #[test]
    fn test_create_address_rejects_foreign_kind() {
        let transport = InMemoryTransport::new();
        let mut desc = ChannelDescriptor::with_address(
            "",
            Direction::Recv,
            TransportKind::Ipc,
            SerializerState::default(),
        );

        assert!(matches!(
            transport.create_address(&mut desc),
            Err(ChannelError::KindMismatch { .. })
        ));
        assert!(desc.address.is_empty());
        assert_eq!(transport.queue_count(), 0);
    }

    #[test]
    fn test_second_receiver_rejected() {
        let transport = InMemoryTransport::new();
        let mut first = open(&transport, "q", Direction::Recv);
        let mut second = descriptor("q", Direction::Recv);

        assert_eq!(
            transport.initialize(&mut second),
            Err(ChannelError::AddressInUse("q".into()))
        );
        assert!(!second.initialized);

        // The rejected receiver must not take the live queue with it
        transport.teardown(&mut second);
        assert!(transport.has_queue("q"));

        transport.teardown(&mut first);
        let reopened = open(&transport, "q", Direction::Recv);
        assert!(reopened.initialized);
    }

    #[test]
    fn test_send_after_receiver_gone() {
        let transport = InMemoryTransport::new();
        let mut rx = open(&transport, "q", Direction::Recv);
        let tx = open(&transport, "q", Direction::Send);
        transport.teardown(&mut rx);

        assert_eq!(transport.send(&tx, b"x"), Err(ChannelError::Closed("q".into())));
    }

    #[test]
    fn test_strict_connect_requires_queue() {
        let transport =
            InMemoryTransport::with_config(MemoryTransportConfig::default().strict_connect());
        let mut tx = descriptor("nowhere", Direction::Send);

        assert_eq!(
            transport.initialize(&mut tx),
            Err(ChannelError::UnknownAddress("nowhere".into()))
        );
    }

    #[test]
    fn test_named_channel_resolution() {
        let transport = InMemoryTransport::new();
        transport.register_name("inbox", "q-inbox");

        let mut desc = ChannelDescriptor::with_name(
            "inbox",
            Direction::Recv,
            TransportKind::Memory,
            SerializerState::default(),
        );
        transport.initialize(&mut desc).unwrap();
        assert_eq!(desc.address, "q-inbox");

        let mut unknown = ChannelDescriptor::with_name(
            "nobody",
            Direction::Recv,
            TransportKind::Memory,
            SerializerState::default(),
        );
        assert_eq!(
            transport.initialize(&mut unknown),
            Err(ChannelError::UnknownName("nobody".into()))
        );
    }

    #[test]
    fn test_purge_and_remove() {
        let transport = InMemoryTransport::new();
        transport.push("q", b"1".to_vec()).unwrap();
        transport.push("q", b"2".to_vec()).unwrap();

        assert_eq!(transport.purge("q"), 2);
        assert_eq!(transport.queued("q"), 0);
        assert!(transport.remove_queue("q"));
        assert!(!transport.remove_queue("q"));
        assert_eq!(transport.take("q"), None);
    }
}
