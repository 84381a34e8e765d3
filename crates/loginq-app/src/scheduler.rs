// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use crate::clock::Clock;

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
struct Scheduled<T> {
    due_at: OffsetDateTime,
    payload: T,
}

/// Debounced per-key work. Scheduling a key again replaces its payload and
/// restarts its timer; nothing fires on its own, callers poll [`due`].
///
/// [`due`]: Scheduler::due
pub struct Scheduler<K, T> {
    clock: Arc<dyn Clock>,
    pending: BTreeMap<K, Scheduled<T>>,
}

impl<K: Ord + Clone, T> Scheduler<K, T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: BTreeMap::new(),
        }
    }

    /// Returns the payload straight back when `delay` is zero; the caller
    /// runs it now. Otherwise it waits for `due`, `flush` or `flush_all`.
    pub fn schedule(&mut self, key: K, delay: Duration, payload: T) -> Option<T> {
        if delay.is_zero() {
            self.pending.remove(&key);
            return Some(payload);
        }
        let due_at = self.clock.now() + delay;
        self.pending.insert(key, Scheduled { due_at, payload });
        None
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn flush(&mut self, key: &K) -> Option<T> {
        self.pending.remove(key).map(|scheduled| scheduled.payload)
    }

    pub fn flush_all(&mut self) -> Vec<(K, T)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(key, scheduled)| (key, scheduled.payload))
            .collect()
    }

    pub fn due(&mut self) -> Vec<(K, T)> {
        let now = self.clock.now();
        let ready: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, scheduled)| scheduled.due_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        ready
            .into_iter()
            .filter_map(|key| {
                let scheduled = self.pending.remove(&key)?;
                Some((key, scheduled.payload))
            })
            .collect()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn payloads(&self) -> impl Iterator<Item = &T> {
        self.pending.values().map(|scheduled| &scheduled.payload)
    }

    /// Earliest pending deadline, for callers that want to sleep until then.
    pub fn next_due(&self) -> Option<OffsetDateTime> {
        self.pending.values().map(|scheduled| scheduled.due_at).min()
    }
}
