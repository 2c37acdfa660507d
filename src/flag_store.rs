use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, PoisonError, RwLock},
};

use crate::flags::FlagDefinition;

/// An immutable set of active flag definitions.
#[derive(Debug, Default)]
pub struct FlagSnapshot {
    flags: Vec<FlagDefinition>,
    /// Index of the first definition for each key.
    index: HashMap<String, usize>,
}

impl FlagSnapshot {
    /// Build a snapshot from the raw definitions, dropping inactive flags.
    pub fn from_definitions(definitions: Vec<FlagDefinition>) -> FlagSnapshot {
        let flags: Vec<FlagDefinition> = definitions.into_iter().filter(|f| f.active).collect();
        let mut index = HashMap::with_capacity(flags.len());
        for (i, flag) in flags.iter().enumerate() {
            index.entry(flag.key.clone()).or_insert(i);
        }
        FlagSnapshot { flags, index }
    }

    /// Active flags in the order the server returned them.
    pub fn flags(&self) -> &[FlagDefinition] {
        &self.flags
    }

    pub fn get(&self, key: &str) -> Option<&FlagDefinition> {
        self.index.get(key).map(|&i| &self.flags[i])
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[derive(Debug, Default)]
struct LoadGate {
    loaded: bool,
    closed: bool,
}

/// `FlagStore` holds the current [`FlagSnapshot`] and lets readers wait for the first one.
///
/// Snapshots are swapped as a whole; readers never observe a partial update.
pub struct FlagStore {
    snapshot: RwLock<Arc<FlagSnapshot>>,
    gate: Mutex<LoadGate>,
    ready: Condvar,
}

impl FlagStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(FlagSnapshot::default())),
            gate: Mutex::new(LoadGate::default()),
            ready: Condvar::new(),
        }
    }

    /// Current snapshot, empty until the first successful load. Never blocks on a fetch.
    pub fn get_snapshot(&self) -> Arc<FlagSnapshot> {
        // The lock only ever guards a whole `Arc`, so a poisoned lock still holds a consistent
        // value.
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&snapshot)
    }

    /// Block until the first snapshot is published or the store is closed.
    ///
    /// After [`FlagStore::close`] this returns whatever was loaded so far, possibly the empty
    /// snapshot.
    pub fn wait_for_snapshot(&self) -> Arc<FlagSnapshot> {
        {
            let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            while !gate.loaded && !gate.closed {
                gate = self
                    .ready
                    .wait(gate)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        self.get_snapshot()
    }

    /// Publish a new snapshot, returning the previous one.
    ///
    /// Returns `None` and discards `snapshot` if the store is closed.
    pub fn set_snapshot(&self, snapshot: FlagSnapshot) -> Option<Arc<FlagSnapshot>> {
        // Constructing new value before requesting the lock to minimize lock span.
        let new_value = Arc::new(snapshot);

        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if gate.closed {
            log::debug!(target: "featureflags", "store is closed, discarding flags");
            return None;
        }

        let previous = {
            let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, new_value)
        };

        if !gate.loaded {
            gate.loaded = true;
            self.ready.notify_all();
        }
        Some(previous)
    }

    /// Returns `true` once a snapshot has been published.
    pub fn is_loaded(&self) -> bool {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded
    }

    /// Stop accepting snapshots and release all waiting readers.
    pub fn close(&self) {
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        gate.closed = true;
        self.ready.notify_all();
    }
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new()
    }
}
