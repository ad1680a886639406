//! Broadcast hub: fans state-change events out to every open connection.
//!
//! Each connection is represented by the sending half of an unbounded
//! channel; the connection's own writer task drains the channel into its
//! socket. Publishing serializes the event once and hands the identical
//! frame to every open sender, so a slow or failing peer never blocks the
//! rest. Delivery is best-effort and at-most-once; peers that are mid-close
//! get nothing queued, and nothing is replayed to late joiners.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::events::BroadcastEvent;

/// Identity of one live connection. Monotonic, never reused, so a
/// reconnecting peer is always a fresh registration.
pub type ConnectionId = u64;

/// The set of currently-open peer connections.
pub struct BroadcastHub {
    connections: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a connection to the live set and return its id.
    pub fn register(&self, sender: mpsc::UnboundedSender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .lock()
            .expect("hub lock poisoned")
            .insert(id, sender);
        debug!(connection = id, "observer registered");
        id
    }

    /// Remove a connection. Safe to call for ids already pruned.
    pub fn unregister(&self, id: ConnectionId) {
        if self
            .connections
            .lock()
            .expect("hub lock poisoned")
            .remove(&id)
            .is_some()
        {
            debug!(connection = id, "observer unregistered");
        }
    }

    /// Serialize `event` once and send the identical frame to every open
    /// connection. Connections whose receiving half is gone are pruned in
    /// the same sweep. Returns the number of connections that accepted the
    /// frame.
    pub fn publish(&self, event: &BroadcastEvent) -> usize {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(err) => {
                error!(error = %err, "failed to serialize broadcast event");
                return 0;
            }
        };

        let mut connections = self.connections.lock().expect("hub lock poisoned");
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, sender) in connections.iter() {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            connections.remove(&id);
            debug!(connection = id, "pruned closed observer");
        }
        delivered
    }

    /// Number of connections currently in the live set.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().expect("hub lock poisoned").len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
