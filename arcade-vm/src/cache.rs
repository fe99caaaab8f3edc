//! # Session Cache
//!
//! Bounded, insertion-ordered map from session id to the latest compiled
//! artifact and state. Writes refresh recency, reads do not. When the map
//! grows past its capacity the least recently inserted session is dropped
//! without notice; a later state update for it sees `NoActiveSession`.
//!
//! Every mutating call runs under one lock, so `put` and its eviction can't
//! interleave with another session's `update_state_only`.

use crate::artifact::Artifact;
use crate::error::{self, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What the cache keeps per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub artifact: Artifact,
    pub state: Value,
    pub title: String,
}

impl SessionRecord {
    pub fn new(artifact: Artifact, state: Value, title: impl Into<String>) -> Self {
        Self { artifact, state, title: title.into() }
    }
}

/// Shared session store. Construct one per service and pass it in.
#[derive(Debug)]
pub struct SessionCache {
    capacity: usize,
    entries: Mutex<IndexMap<String, SessionRecord>>,
}

impl SessionCache {
    /// `capacity` below 1 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.lock().contains_key(session_id)
    }

    /// Insert or replace a whole record, making it the most recent entry.
    pub fn put(&self, session_id: impl Into<String>, record: SessionRecord) {
        let session_id = session_id.into();
        let mut entries = self.entries.lock();
        entries.shift_remove(&session_id);
        entries.insert(session_id, record);
        Self::evict(&mut entries, self.capacity);
    }

    /// Plain lookup; ordering is untouched.
    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.entries.lock().get(session_id).cloned()
    }

    /// Replace only the state of an existing session and refresh its recency.
    ///
    /// Returns the updated record together with the state it replaced.
    pub fn update_state_only(&self, session_id: &str, state: Value) -> Result<(SessionRecord, Value)> {
        let mut entries = self.entries.lock();
        let Some(mut record) = entries.shift_remove(session_id) else {
            return Err(error::no_active_session(session_id).with_operation("SessionCache::update_state_only"));
        };
        let previous = std::mem::replace(&mut record.state, state);
        entries.insert(session_id.to_string(), record.clone());
        Ok((record, previous))
    }

    /// Session ids from least to most recently inserted.
    pub fn session_ids(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    fn evict(entries: &mut IndexMap<String, SessionRecord>, capacity: usize) {
        while entries.len() > capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                debug!(session_id = %evicted, capacity, "session evicted");
            }
        }
    }
}
