//! Bounded in-memory activity log
//!
//! One instance per process, shared by reference. History is lost on restart.

use crate::error::EventError;
use crate::event::{ActivityEvent, EventDraft};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Lock could not be taken because a writer panicked while holding it
#[derive(Debug, thiserror::Error)]
#[error("activity log lock poisoned")]
pub struct StorePoisoned;

impl<T> From<PoisonError<T>> for StorePoisoned {
    fn from(_: PoisonError<T>) -> Self {
        StorePoisoned
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error(transparent)]
    Rejected(#[from] EventError),
    #[error(transparent)]
    Poisoned(#[from] StorePoisoned),
}

/// FIFO ring buffer of recent activity events
pub struct ActivityLog {
    events: Mutex<VecDeque<ActivityEvent>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<ActivityEvent>>, StorePoisoned> {
        Ok(self.events.lock()?)
    }

    /// Validate and record a draft, evicting the oldest entries past capacity.
    ///
    /// Timestamping, insertion and eviction happen under a single lock, so
    /// insertion order and timestamp order agree.
    pub fn append(&self, draft: EventDraft) -> Result<ActivityEvent, AppendError> {
        let mut events = self.lock()?;
        let event = draft.finalize(Utc::now())?;
        events.push_back(event.clone());
        let mut evicted = 0;
        while events.len() > self.capacity {
            events.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "activity log at capacity");
        }
        Ok(event)
    }

    /// Window of events counted back from the newest, returned oldest first.
    ///
    /// `offset` skips that many of the most recent events; `limit` bounds the
    /// window size. The result is in insertion order (most recent last).
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<ActivityEvent>, StorePoisoned> {
        Ok(self.list_with_total(limit, offset)?.0)
    }

    /// Same window as [`list`](Self::list) plus the number of held events,
    /// read under one lock.
    pub fn list_with_total(&self, limit: usize, offset: usize) -> Result<(Vec<ActivityEvent>, usize), StorePoisoned> {
        let events = self.lock()?;
        let end = events.len().saturating_sub(offset);
        let start = end.saturating_sub(limit);
        Ok((events.range(start..end).cloned().collect(), events.len()))
    }

    pub fn len(&self) -> Result<usize, StorePoisoned> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorePoisoned> {
        Ok(self.lock()?.is_empty())
    }

    /// Drop every held event; returns how many were removed.
    pub fn clear(&self) -> Result<usize, StorePoisoned> {
        let mut events = self.lock()?;
        let removed = events.len();
        events.clear();
        Ok(removed)
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
