//! Resolver metrics.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

//------------ ServerMetrics -------------------------------------------------

/// Counters describing the traffic a [`DgramServer`] has handled.
///
/// [`DgramServer`]: super::dgram::DgramServer
#[derive(Debug, Default)]
pub struct ServerMetrics {
    num_received_requests: AtomicUsize,

    num_malformed_requests: AtomicUsize,

    num_sent_responses: AtomicUsize,

    num_failed_responses: AtomicUsize,
}

impl ServerMetrics {
    /// Creates metrics with all counters at zero.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of datagrams received.
    pub fn num_received_requests(&self) -> usize {
        self.num_received_requests.load(Ordering::Relaxed)
    }

    /// The number of received datagrams that were not a message at all.
    pub fn num_malformed_requests(&self) -> usize {
        self.num_malformed_requests.load(Ordering::Relaxed)
    }

    /// The number of replies sent.
    pub fn num_sent_responses(&self) -> usize {
        self.num_sent_responses.load(Ordering::Relaxed)
    }

    /// The number of replies that could not be sent.
    pub fn num_failed_responses(&self) -> usize {
        self.num_failed_responses.load(Ordering::Relaxed)
    }
}

impl ServerMetrics {
    pub(super) fn inc_num_received_requests(&self) {
        self.num_received_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_num_malformed_requests(&self) {
        self.num_malformed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_num_sent_responses(&self) {
        self.num_sent_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_num_failed_responses(&self) {
        self.num_failed_responses.fetch_add(1, Ordering::Relaxed);
    }
}
