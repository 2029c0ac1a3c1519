//! In-process bus announcing that job data changed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::sources::{ChangeFeed, ChangeListener, Subscription};

/// What happened to the job data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    JobCreated,
    JobUpdated,
    JobDeleted,
    /// Bulk import or scrape finished
    Refreshed,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: ChangeKind,
}

type ListenerMap = HashMap<u64, ChangeListener>;

/// In-process "job data changed" bus
#[derive(Clone, Default)]
pub struct ChangeBus {
    listeners: Arc<Mutex<ListenerMap>>,
    next_listener: Arc<AtomicU64>,
    sequence: Arc<AtomicU64>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to every listener (returns sequence number)
    pub fn publish(&self, kind: ChangeKind) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ChangeEvent { sequence, timestamp: Utc::now(), kind };

        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<ChangeListener> = match self.listeners.lock() {
            Ok(map) => map.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        for listener in listeners {
            listener(&event);
        }
        sequence
    }

    /// Get current sequence number
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Get number of active listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|map| map.len()).unwrap_or(0)
    }
}

impl ChangeFeed for ChangeBus {
    fn subscribe(&self, listener: ChangeListener) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut map) = self.listeners.lock() {
            map.insert(id, listener);
        }

        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || {
            if let Ok(mut map) = listeners.lock() {
                map.remove(&id);
            }
        })
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("listeners", &self.listener_count())
            .field("sequence", &self.current_sequence())
            .finish()
    }
}
