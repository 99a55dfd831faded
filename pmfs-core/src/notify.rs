//! Fan-out of project change events to in-process subscribers.
//!
//! Each subscriber owns a bounded channel. Publishing never blocks: a full
//! receiver misses the event, a dropped receiver is pruned.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;
use uuid::Uuid;

/// Product and project ID.
pub type ProjectKey = (u32, u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectChanged {
    pub product_id: u32,
    pub project_id: u32,
    pub at: DateTime<Utc>,
}

/// Returned by [`ChangeNotifier::subscribe`]; pass to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

#[derive(Debug)]
pub struct ChangeNotifier {
    capacity: usize,
    subscribers: Mutex<HashMap<ProjectKey, Vec<(Uuid, SyncSender<ProjectChanged>)>>>,
}

impl ChangeNotifier {
    /// `capacity` bounds each subscriber's queue (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, key: ProjectKey) -> (Subscription, Receiver<ProjectChanged>) {
        let (tx, rx) = mpsc::sync_channel(self.capacity);
        let id = Uuid::new_v4();
        self.subscribers().entry(key).or_default().push((id, tx));
        (Subscription(id), rx)
    }

    pub fn unsubscribe(&self, key: ProjectKey, subscription: Subscription) {
        let mut subs = self.subscribers();
        if let Some(list) = subs.get_mut(&key) {
            list.retain(|(id, _)| *id != subscription.0);
            if list.is_empty() {
                subs.remove(&key);
            }
        }
    }

    pub fn subscriber_count(&self, key: ProjectKey) -> usize {
        self.subscribers().get(&key).map_or(0, Vec::len)
    }

    /// Sends a change event for `key` to every live subscriber.
    pub fn notify(&self, key: ProjectKey) {
        let event = ProjectChanged {
            product_id: key.0,
            project_id: key.1,
            at: Utc::now(),
        };
        let mut subs = self.subscribers();
        let Some(list) = subs.get_mut(&key) else {
            return;
        };
        list.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    subscription = %id,
                    product_id = key.0,
                    project_id = key.1,
                    "subscriber full, event dropped"
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        if list.is_empty() {
            subs.remove(&key);
        }
    }

    fn subscribers(
        &self,
    ) -> MutexGuard<'_, HashMap<ProjectKey, Vec<(Uuid, SyncSender<ProjectChanged>)>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(crate::config::NotifyConfig::default().capacity)
    }
}
