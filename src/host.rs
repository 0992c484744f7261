//! Host collaborator interfaces
//!
//! The engine runs inside a client process and talks to two host-provided
//! collaborators: a durable key-value store for JSON blobs and a local
//! notification scheduler. Both are fire-and-forget from the engine's point
//! of view; failures are logged at the call site and degrade to "no data" or
//! "no intervention fired".

use crate::error::{NotificationError, StoreError};
use crate::types::{NotificationContent, NotificationId};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Durable record store collaborator.
///
/// Simple last-write-wins key-value access to JSON-serializable blobs. No
/// transactional guarantees are assumed.
pub trait RecordStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Notification collaborator.
///
/// The engine only requests future local notifications; it never observes
/// delivery success.
pub trait NotificationPort {
    fn schedule_local(
        &mut self,
        content: NotificationContent,
        fire_at: DateTime<Utc>,
    ) -> Result<NotificationId, NotificationError>;

    fn cancel(&mut self, id: &NotificationId) -> Result<(), NotificationError>;
}

/// Read a JSON blob from the store, degrading unreadable or missing data to
/// `None` with a log line.
pub(crate) fn read_json<T: DeserializeOwned>(store: &dyn RecordStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable blob");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "store read failed; treating as no data");
            None
        }
    }
}

/// Write a JSON blob to the store. A failure is logged and skipped; the next
/// successful write supersedes it.
pub(crate) fn write_json<T: Serialize>(store: &mut dyn RecordStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => {
            if let Err(e) = store.set(key, &json) {
                tracing::warn!(key, error = %e, "store write failed; skipping this cycle");
            }
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "blob serialization failed");
        }
    }
}

/// In-memory `RecordStore` backed by a `HashMap`.
///
/// Suitable as the real store on hosts that snapshot the map themselves, and
/// as the store in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// `NotificationPort` that records every request instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    scheduled: Vec<(NotificationId, NotificationContent, DateTime<Utc>)>,
    cancelled: Vec<NotificationId>,
    next_id: u64,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> &[(NotificationId, NotificationContent, DateTime<Utc>)] {
        &self.scheduled
    }

    pub fn cancelled(&self) -> &[NotificationId] {
        &self.cancelled
    }
}

impl NotificationPort for RecordingNotifier {
    fn schedule_local(
        &mut self,
        content: NotificationContent,
        fire_at: DateTime<Utc>,
    ) -> Result<NotificationId, NotificationError> {
        self.next_id += 1;
        let id = NotificationId(format!("notif-{}", self.next_id));
        self.scheduled.push((id.clone(), content, fire_at));
        Ok(id)
    }

    fn cancel(&mut self, id: &NotificationId) -> Result<(), NotificationError> {
        self.cancelled.push(id.clone());
        Ok(())
    }
}

/// `RecordStore` that refuses every access, for exercising the degrade paths
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
impl RecordStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError(format!("read refused: {key}")))
    }

    fn set(&mut self, key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError(format!("write refused: {key}")))
    }
}

/// `NotificationPort` that refuses every request
#[cfg(test)]
pub(crate) struct FailingNotifier;

#[cfg(test)]
impl NotificationPort for FailingNotifier {
    fn schedule_local(
        &mut self,
        _content: NotificationContent,
        _fire_at: DateTime<Utc>,
    ) -> Result<NotificationId, NotificationError> {
        Err(NotificationError("delivery channel down".to_string()))
    }

    fn cancel(&mut self, _id: &NotificationId) -> Result<(), NotificationError> {
        Err(NotificationError("delivery channel down".to_string()))
    }
}
