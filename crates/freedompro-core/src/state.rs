// ── Cached accessory state ──
//
// Last-known on/off value per accessory. Four producers write here
// without coordination; every write is stamped with a global sequence
// number and its source so recency rules can be layered on later.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Who wrote a cached state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StateSource {
    /// Default value on creation or restore.
    Initial,
    /// Optimistic write after a command was accepted.
    Command,
    /// `REPORT_STATE` from the event stream.
    Stream,
    /// Per-accessory poll.
    AccessoryPoll,
    /// Global poll.
    GlobalPoll,
}

/// One cached value with its write stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEntry {
    pub on: bool,
    /// Global write order across all accessories.
    pub seq: u64,
    pub source: StateSource,
    pub updated_at: DateTime<Utc>,
}

/// Per-accessory state cache. Last write wins, whatever its source.
#[derive(Debug, Default)]
pub struct StateCache {
    entries: DashMap<Uuid, StateEntry>,
    seq: AtomicU64,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `off` for an accessory that has no value yet.
    ///
    /// Returns `true` if an entry was created.
    pub fn ensure(&self, uuid: Uuid) -> bool {
        let mut created = false;
        self.entries.entry(uuid).or_insert_with(|| {
            created = true;
            self.stamp(false, StateSource::Initial)
        });
        created
    }

    /// Overwrite the cached value. Returns the stored entry.
    pub fn write(&self, uuid: Uuid, on: bool, source: StateSource) -> StateEntry {
        let entry = self.stamp(on, source);
        self.entries.insert(uuid, entry);
        entry
    }

    /// Cached on/off value, if the accessory is known.
    pub fn get(&self, uuid: &Uuid) -> Option<bool> {
        self.entries.get(uuid).map(|e| e.on)
    }

    /// Cached value together with its write stamp.
    pub fn entry(&self, uuid: &Uuid) -> Option<StateEntry> {
        self.entries.get(uuid).map(|e| *e.value())
    }

    pub fn snapshot(&self) -> Vec<(Uuid, StateEntry)> {
        self.entries.iter().map(|r| (*r.key(), *r.value())).collect()
    }

    /// Sequence number of the most recent write (0 if none).
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    fn stamp(&self, on: bool, source: StateSource) -> StateEntry {
        StateEntry {
            on,
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            source,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ensure_defaults_to_off_once() {
        let cache = StateCache::new();
        let id = Uuid::new_v4();

        assert!(cache.ensure(id));
        assert_eq!(cache.get(&id), Some(false));

        cache.write(id, true, StateSource::Stream);
        assert!(!cache.ensure(id));
        assert_eq!(cache.get(&id), Some(true));
    }

    #[test]
    fn last_write_wins_regardless_of_source() {
        let cache = StateCache::new();
        let id = Uuid::new_v4();

        cache.write(id, true, StateSource::Stream);
        cache.write(id, false, StateSource::GlobalPoll);

        let entry = cache.entry(&id).unwrap();
        assert!(!entry.on);
        assert_eq!(entry.source, StateSource::GlobalPoll);
    }

    #[test]
    fn writes_are_sequenced() {
        let cache = StateCache::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = cache.write(a, true, StateSource::Command);
        let second = cache.write(b, true, StateSource::AccessoryPoll);

        assert!(second.seq > first.seq);
        assert_eq!(cache.last_seq(), second.seq);
        assert_eq!(cache.snapshot().len(), 2);
    }

    #[test]
    fn unknown_accessory_has_no_state() {
        let cache = StateCache::new();
        assert!(cache.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn source_display_is_snake_case() {
        assert_eq!(StateSource::AccessoryPoll.to_string(), "accessory_poll");
    }
}
