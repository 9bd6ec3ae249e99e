//! Query-response correlation.
//!
//! # Responsibilities
//! - Mint query identifiers and install one waiter per identifier
//! - Route each inbound tagged envelope to its waiter
//! - Enforce the per-wait deadline; discard the wait on timeout
//! - Count and log unmatched (stale) deliveries
//!
//! # Design Decisions
//! - Each wait is a private oneshot channel, not a poll loop: the inbound
//!   reader never blocks on a slow caller and callers never busy-wait
//! - Timeout removes the pending entry before returning, so a response
//!   arriving late is dropped instead of resolving a reused identifier
//! - Unmatched deliveries are observable (counter + warn), never an error

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::core::wire::{QueryId, ResponseEnvelope};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;

/// A waiter installed for one in-flight query.
struct PendingWait {
    /// Channel the inbound reader delivers the envelope on.
    sender: oneshot::Sender<ResponseEnvelope>,
    /// When the wait was created, for latency logging.
    created_at: Instant,
}

/// Counters describing the correlator's lifetime activity.
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Waits registered.
    pub registered: AtomicU64,
    /// Envelopes delivered to a live waiter.
    pub delivered: AtomicU64,
    /// Waits abandoned because the deadline fired first.
    pub timeouts: AtomicU64,
    /// Envelopes dropped because no waiter matched their identifier.
    pub stale_drops: AtomicU64,
}

/// Correlates outbound tagged requests with their eventual responses.
///
/// Flow:
/// 1. A handler calls [`register`](Self::register) to mint a `QueryId` and
///    obtain the receiving end of a private oneshot channel.
/// 2. The handler transmits its request tagged with that id and suspends on
///    [`await_response`](Self::await_response).
/// 3. The connection's inbound reader calls [`deliver`](Self::deliver) for
///    every tagged envelope it drains from the stream.
/// 4. The wait resolves with the envelope, or the deadline discards it.
pub struct QueryCorrelator {
    pending: DashMap<QueryId, PendingWait>,
    stats: CorrelatorStats,
}

impl QueryCorrelator {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: CorrelatorStats::default(),
        }
    }

    /// Mint an identifier and install its waiter.
    ///
    /// The returned receiver resolves when the matching envelope arrives.
    /// Callers transmit the tagged request themselves; registration never
    /// touches the connection and never blocks.
    pub fn register(&self) -> (QueryId, oneshot::Receiver<ResponseEnvelope>) {
        let query_id = QueryId::new();
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            query_id,
            PendingWait {
                sender: tx,
                created_at: Instant::now(),
            },
        );
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(query_id = %query_id, "Registered pending wait");

        (query_id, rx)
    }

    /// Deliver an inbound envelope to the waiter for its query id.
    ///
    /// Returns false when no wait matches: the response is stale (its wait
    /// timed out) or was never requested. Either way it is dropped and
    /// counted, and no other pending wait is affected.
    pub fn deliver(&self, envelope: ResponseEnvelope) -> bool {
        let query_id = envelope.query_id;
        match self.pending.remove(&query_id) {
            Some((_, wait)) => {
                let waited = wait.created_at.elapsed();
                if wait.sender.send(envelope).is_ok() {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        query_id = %query_id,
                        waited_ms = waited.as_millis() as u64,
                        "Delivered response to waiter"
                    );
                    true
                } else {
                    // Receiver dropped between timeout and removal.
                    self.record_stale(query_id);
                    false
                }
            }
            None => {
                self.record_stale(query_id);
                false
            }
        }
    }

    /// Suspend until the envelope for `query_id` arrives or the deadline
    /// elapses. On timeout the pending wait is discarded first, so a late
    /// response is simply dropped by [`deliver`](Self::deliver).
    pub async fn await_response(
        &self,
        query_id: QueryId,
        rx: oneshot::Receiver<ResponseEnvelope>,
        deadline: Duration,
    ) -> GatewayResult<ResponseEnvelope> {
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => {
                // Sender side dropped without delivering: the connection
                // reader failed every in-flight wait.
                Err(GatewayError::ConnectionLost)
            }
            Err(_) => {
                self.discard(query_id);
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                metrics::record_query_timeout();
                tracing::warn!(
                    query_id = %query_id,
                    deadline_ms = deadline.as_millis() as u64,
                    "No response within deadline, wait discarded"
                );
                Err(GatewayError::Timeout(deadline))
            }
        }
    }

    /// Remove a pending wait without resolving it.
    ///
    /// Used on timeout and when a submit fails after registration.
    pub fn discard(&self, query_id: QueryId) -> bool {
        self.pending.remove(&query_id).is_some()
    }

    /// Resolve every in-flight wait with a connection-lost error by
    /// dropping its delivery slot. Called by the reader when the shared
    /// stream goes away; the process itself keeps running.
    pub fn fail_all(&self) {
        let count = self.pending.len();
        self.pending.clear();
        if count > 0 {
            tracing::warn!(waits = count, "Connection lost, failing in-flight waits");
        }
    }

    /// Number of currently pending waits.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }

    fn record_stale(&self, query_id: QueryId) {
        self.stats.stale_drops.fetch_add(1, Ordering::Relaxed);
        metrics::record_stale_delivery();
        tracing::warn!(
            query_id = %query_id,
            "Dropping response with no matching pending wait"
        );
    }
}

impl Default for QueryCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
