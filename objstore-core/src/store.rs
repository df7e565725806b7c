//! The store itself: entry table, pending-get registry, and eviction
//! index behind one lock, plus the handle-release path that runs on
//! whatever thread happens to drop the last clone of a [`Handle`].

use std::sync::Arc;

use hashbrown::HashMap;
use objstore_common::{Blob, ObjectId, StoreError};
use parking_lot::Mutex;

use crate::entry::EntryRecord;
use crate::eviction::EvictionIndex;
use crate::handle::Handle;
use crate::rendezvous::{Delivery, Mode, RendezvousRequest};

/// A point-in-time snapshot of store occupancy and lifetime counters.
///
/// This is not a metrics-exporter integration — just a plain struct a
/// caller can poll or log. Taking it briefly holds the store lock and
/// never blocks on a condition variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub entry_count: u64,
    pub resident_bytes: u64,
    pub pinned_count: u64,
    pub puts: u64,
    pub gets: u64,
    pub evictions: u64,
    pub rejections: u64,
}

struct StoreState {
    entries: HashMap<ObjectId, EntryRecord, ahash::RandomState>,
    eviction: EvictionIndex,
    pending: HashMap<ObjectId, Vec<Arc<RendezvousRequest>>, ahash::RandomState>,
    max_bytes: u64,
    resident_bytes: u64,
    puts: u64,
    gets: u64,
    evictions: u64,
    rejections: u64,
}

pub(crate) struct StoreGuts {
    state: Mutex<StoreState>,
}

impl StoreGuts {
    /// Invoked from a [`Handle`]'s destructor, possibly on a thread
    /// that has never touched this store before. Must be infallible:
    /// a refcount going negative here is a store bug, not user error,
    /// and is treated as fatal rather than masked.
    pub(crate) fn release(&self, id: ObjectId) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(&id) {
            assert!(entry.refcount > 0, "refcount underflow releasing {id}");
            entry.refcount -= 1;
            if entry.refcount == 0 {
                let size = entry.size();
                state.eviction.push_front(id, size);
                tracing::debug!(%id, "handle released, entry re-admitted to eviction index");
            }
        }
    }
}

/// An in-process, thread-safe, eviction-bounded object store.
///
/// Cheap to clone: cloning shares the same underlying state via `Arc`,
/// the way a connection pool handle would. There is no teardown method
/// — dropping the last clone drops everything still resident.
#[derive(Clone)]
pub struct Store {
    guts: Arc<StoreGuts>,
}

impl Store {
    /// Builds a store capped at `max_bytes` of resident blob data.
    /// `max_bytes` is the only configuration this store takes; there is
    /// no config file or environment layer for a single knob.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            guts: Arc::new(StoreGuts {
                state: Mutex::new(StoreState {
                    entries: HashMap::default(),
                    eviction: EvictionIndex::new(),
                    pending: HashMap::default(),
                    max_bytes,
                    resident_bytes: 0,
                    puts: 0,
                    gets: 0,
                    evictions: 0,
                    rejections: 0,
                }),
            }),
        }
    }

    /// Inserts `blob` under `id`. Fails with `AlreadyExists` if `id` is
    /// already resident, or with `OutOfMemory` if evicting every
    /// unreferenced entry still would not make room — in the latter
    /// case the store is left completely unmodified.
    pub fn put(&self, id: ObjectId, blob: Blob) -> Result<(), StoreError> {
        let size = blob.size();
        let mut state = self.guts.state.lock();

        if state.entries.contains_key(&id) {
            state.rejections += 1;
            tracing::warn!(%id, "put rejected: already exists");
            return Err(StoreError::AlreadyExists(id));
        }

        if state.resident_bytes + size > state.max_bytes {
            let shortfall = state.resident_bytes + size - state.max_bytes;
            if state.eviction.total_bytes() < shortfall {
                let available = state.max_bytes.saturating_sub(state.resident_bytes);
                state.rejections += 1;
                tracing::warn!(%id, requested = size, available, "put rejected: out of memory");
                return Err(StoreError::OutOfMemory {
                    requested: size,
                    available,
                });
            }
            let mut freed = 0u64;
            while freed < shortfall {
                let (victim_id, victim_size) = state
                    .eviction
                    .pop_back()
                    .expect("total_bytes precheck guarantees enough victims");
                state.entries.remove(&victim_id);
                state.resident_bytes -= victim_size;
                freed += victim_size;
                state.evictions += 1;
                tracing::debug!(%victim_id, %id, "evicted to make room for put");
            }
        }

        state.entries.insert(id, EntryRecord::new(blob));
        state.eviction.push_front(id, size);
        state.resident_bytes += size;
        state.puts += 1;

        if let Some(requests) = state.pending.remove(&id) {
            for req in requests {
                match req.mode() {
                    Mode::Get => {
                        let handle = Self::pin_locked(&self.guts, &mut state, id);
                        req.set(id, Delivery::Handle(handle));
                    }
                    Mode::Wait => {
                        req.set(id, Delivery::Present);
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns one slot per input id, in order, each a pinning handle
    /// or `None`. Duplicates are filled independently. `timeout_ms` of
    /// `-1` waits forever, `0` returns only what was already resident.
    pub fn get(&self, ids: &[ObjectId], timeout_ms: i64) -> Vec<Option<Handle>> {
        let mut results: Vec<Option<Handle>> = vec![None; ids.len()];
        let mut state = self.guts.state.lock();
        state.gets += 1;

        let mut missing_positions = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            if state.entries.contains_key(id) {
                results[i] = Some(Self::pin_locked(&self.guts, &mut state, *id));
            } else {
                missing_positions.push(i);
            }
        }

        if missing_positions.is_empty() || timeout_ms == 0 {
            return results;
        }

        let req = Arc::new(RendezvousRequest::new(
            Mode::Get,
            missing_positions.iter().map(|&i| ids[i]),
        ));
        let registered_ids = req.missing_ids();
        for id in &registered_ids {
            state.pending.entry(*id).or_default().push(Arc::clone(&req));
        }
        drop(state);

        req.wait(timeout_ms);

        let mut state = self.guts.state.lock();
        for &i in &missing_positions {
            let id = ids[i];
            if let Some(Delivery::Handle(handle)) = req.take(id) {
                results[i] = Some(handle);
            }
        }
        Self::deregister_locked(&mut state, &registered_ids, &req);
        if missing_positions.iter().any(|&i| results[i].is_none()) {
            tracing::debug!(requested = ids.len(), "get returned with unsatisfied slots after timeout");
        }
        results
    }

    /// Returns one boolean per input id: whether it was resident by
    /// the deadline. Never takes handles — this is observation only.
    /// `num_required` must equal `ids.len()`.
    pub fn wait(&self, ids: &[ObjectId], num_required: u32, timeout_ms: i64) -> Result<Vec<bool>, StoreError> {
        if num_required as usize != ids.len() {
            return Err(StoreError::InvalidArgument(format!(
                "num_required ({num_required}) must equal ids.len() ({})",
                ids.len()
            )));
        }

        let mut results = vec![false; ids.len()];
        let mut state = self.guts.state.lock();

        let mut missing_positions = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            if state.entries.contains_key(id) {
                results[i] = true;
            } else {
                missing_positions.push(i);
            }
        }

        if missing_positions.is_empty() || timeout_ms == 0 {
            return Ok(results);
        }

        let req = Arc::new(RendezvousRequest::new(
            Mode::Wait,
            missing_positions.iter().map(|&i| ids[i]),
        ));
        let registered_ids = req.missing_ids();
        for id in &registered_ids {
            state.pending.entry(*id).or_default().push(Arc::clone(&req));
        }
        drop(state);

        req.wait(timeout_ms);

        let mut state = self.guts.state.lock();
        for &i in &missing_positions {
            let id = ids[i];
            if matches!(req.take(id), Some(Delivery::Present)) {
                results[i] = true;
            }
        }
        Self::deregister_locked(&mut state, &registered_ids, &req);
        Ok(results)
    }

    /// Removes entries unconditionally. Outstanding handles remain
    /// valid copies of the bytes; pending waiters are not signalled
    /// and simply time out.
    pub fn delete(&self, ids: &[ObjectId]) {
        let mut state = self.guts.state.lock();
        for id in ids {
            if let Some(entry) = state.entries.remove(id) {
                state.resident_bytes -= entry.size();
                state.eviction.remove(id);
                tracing::debug!(%id, "entry deleted");
            }
        }
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.guts.state.lock();
        StoreStats {
            entry_count: state.entries.len() as u64,
            resident_bytes: state.resident_bytes,
            pinned_count: state.entries.len() as u64 - state.eviction.len() as u64,
            puts: state.puts,
            gets: state.gets,
            evictions: state.evictions,
            rejections: state.rejections,
        }
    }

    /// Resident byte size of `id` without pinning it or touching LRU
    /// order, for callers that want to budget before calling `get`.
    pub fn size_of(&self, id: &ObjectId) -> Option<u64> {
        self.guts.state.lock().entries.get(id).map(|e| e.size())
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.guts.state.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.guts.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resident_bytes(&self) -> u64 {
        self.guts.state.lock().resident_bytes
    }

    fn pin_locked(guts: &Arc<StoreGuts>, state: &mut StoreState, id: ObjectId) -> Handle {
        let was_free = state.entries.get(&id).map(|e| e.refcount == 0).unwrap_or(false);
        if was_free {
            state.eviction.remove(&id);
        }
        let entry = state.entries.get_mut(&id).expect("id must be resident to pin");
        entry.refcount += 1;
        let blob = entry.blob.clone();
        Handle::new(id, blob, Arc::downgrade(guts))
    }

    fn deregister_locked(state: &mut StoreState, registered_ids: &[ObjectId], req: &Arc<RendezvousRequest>) {
        for id in registered_ids {
            if let Some(list) = state.pending.get_mut(id) {
                list.retain(|r| !Arc::ptr_eq(r, req));
                if list.is_empty() {
                    state.pending.remove(id);
                }
            }
        }
    }
}
