//! Counters for communicator activity
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = server.metrics();
//! let snap = metrics.snapshot();
//! assert_eq!(snap.replies_sent, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one communicator
#[derive(Debug, Default)]
pub struct CommMetrics {
    /// Requests accepted with a reply address
    pub requests_received: AtomicU64,
    /// End-of-stream sentinels received
    pub eof_received: AtomicU64,
    /// Replies handed to the base channel
    pub replies_sent: AtomicU64,
    /// Messages rejected for an invalid or address-less header
    pub headers_rejected: AtomicU64,
    /// Response channels successfully initialized
    pub response_channels_opened: AtomicU64,
    /// Response channels torn down
    pub response_channels_closed: AtomicU64,
    /// Total request bytes received
    pub bytes_received: AtomicU64,
    /// Total reply bytes sent
    pub bytes_sent: AtomicU64,
}

impl CommMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted request
    pub fn record_request(&self, bytes: usize) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record an end-of-stream message
    pub fn record_eof(&self) {
        self.eof_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reply
    pub fn record_reply(&self, bytes: usize) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a rejected header
    pub fn record_header_rejected(&self) {
        self.headers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a response channel coming up
    pub fn record_response_opened(&self) {
        self.response_channels_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a response channel going away
    pub fn record_response_closed(&self) {
        self.response_channels_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Response channels opened but not yet closed
    pub fn live_response_channels(&self) -> u64 {
        let opened = self.response_channels_opened.load(Ordering::Relaxed);
        let closed = self.response_channels_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            eof_received: self.eof_received.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            headers_rejected: self.headers_rejected.load(Ordering::Relaxed),
            response_channels_opened: self.response_channels_opened.load(Ordering::Relaxed),
            response_channels_closed: self.response_channels_closed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CommMetrics`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub eof_received: u64,
    pub replies_sent: u64,
    pub headers_rejected: u64,
    pub response_channels_opened: u64,
    pub response_channels_closed: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}
