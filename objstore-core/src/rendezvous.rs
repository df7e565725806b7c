//! Rendezvous requests: the synchronization primitive `get`/`wait` hand
//! out when an id they need is not yet resident.
//!
//! Each request owns its own mutex and condition variable, disjoint
//! from the store's main lock — the store registers a request, drops
//! its own lock, and only the request's lock is held across the sleep.
//! `Put`, running under the store lock, takes each target request's
//! lock briefly to deliver and signal.

use std::time::{Duration, Instant};

use hashbrown::{HashMap, HashSet};
use objstore_common::ObjectId;
use parking_lot::{Condvar, Mutex};

use crate::handle::Handle;

/// Whether a rendezvous request pins delivered objects (GET) or merely
/// observes their presence (WAIT). Kept as a tag on one request type
/// rather than two separate types, since delivery is identical except
/// for this one bit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Get,
    Wait,
}

/// What a `put` hands into a rendezvous request for a satisfied id.
#[derive(Clone)]
pub enum Delivery {
    /// A GET-mode delivery: a handle pinning the entry.
    Handle(Handle),
    /// A WAIT-mode delivery: the id is resident, nothing more.
    Present,
}

struct InnerState {
    missing: HashSet<ObjectId, ahash::RandomState>,
    delivered: HashMap<ObjectId, Delivery, ahash::RandomState>,
    ready: bool,
}

pub struct RendezvousRequest {
    mode: Mode,
    state: Mutex<InnerState>,
    condvar: Condvar,
}

impl RendezvousRequest {
    /// Builds a request for the given mode, still missing exactly
    /// `missing_ids` (a distinct set — the caller has already resolved
    /// duplicates and already-resident ids before constructing this).
    pub fn new(mode: Mode, missing_ids: impl IntoIterator<Item = ObjectId>) -> Self {
        let missing: HashSet<ObjectId, ahash::RandomState> = missing_ids.into_iter().collect();
        let ready = missing.is_empty();
        Self {
            mode,
            state: Mutex::new(InnerState {
                missing,
                delivered: HashMap::default(),
                ready,
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The distinct ids this request is still waiting on, for
    /// registering (or deregistering) in the pending-get registry.
    pub fn missing_ids(&self) -> Vec<ObjectId> {
        self.state.lock().missing.iter().copied().collect()
    }

    /// Records a delivery for `id`. Returns `true` if this delivery is
    /// the one that completed the request (all awaited ids now
    /// satisfied), in which case waiters have already been woken.
    pub fn set(&self, id: ObjectId, delivery: Delivery) -> bool {
        let mut guard = self.state.lock();
        guard.delivered.insert(id, delivery);
        guard.missing.remove(&id);
        let completed_now = guard.missing.is_empty() && !guard.ready;
        if guard.missing.is_empty() {
            guard.ready = true;
        }
        drop(guard);
        if completed_now {
            self.condvar.notify_all();
        }
        completed_now
    }

    /// Sleeps until the request is ready or `timeout_ms` elapses.
    /// `-1` waits forever, `0` checks without sleeping at all.
    /// Returns whether the request was ready when this call returned.
    pub fn wait(&self, timeout_ms: i64) -> bool {
        let mut guard = self.state.lock();
        if guard.ready {
            return true;
        }
        if timeout_ms == 0 {
            return false;
        }
        if timeout_ms < 0 {
            while !guard.ready {
                self.condvar.wait(&mut guard);
            }
            return true;
        }
        let deadline = Duration::from_millis(timeout_ms as u64);
        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                break;
            }
            let remaining = deadline - elapsed;
            let timed_out = self.condvar.wait_for(&mut guard, remaining).timed_out();
            if guard.ready {
                break;
            }
            if timed_out {
                break;
            }
        }
        guard.ready
    }

    /// Extracts whatever was delivered for `id`, if anything. Clones
    /// rather than removes: two positions in the caller's original id
    /// list that both named `id` can each pull an independent clone of
    /// the same underlying delivery (for GET, an `Arc` clone of the
    /// same [`Handle`] — the store only pinned the entry once).
    pub fn take(&self, id: ObjectId) -> Option<Delivery> {
        self.state.lock().delivered.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore_common::Blob;
    use std::sync::Weak;

    fn id(byte: u8) -> ObjectId {
        let mut bytes = [0u8; objstore_common::OBJECT_ID_LEN];
        bytes[0] = byte;
        ObjectId::from_bytes(bytes)
    }

    #[test]
    fn zero_missing_is_ready_immediately() {
        let req = RendezvousRequest::new(Mode::Wait, std::iter::empty());
        assert!(req.wait(0));
    }

    #[test]
    fn set_completes_when_last_missing_id_arrives() {
        let req = RendezvousRequest::new(Mode::Wait, [id(1), id(2)]);
        assert!(!req.wait(0));
        assert!(!req.set(id(1), Delivery::Present));
        assert!(!req.wait(0));
        assert!(req.set(id(2), Delivery::Present));
        assert!(req.wait(0));
    }

    #[test]
    fn take_clones_delivery_for_duplicate_positions() {
        let req = RendezvousRequest::new(Mode::Get, [id(1)]);
        let handle = Handle::new(id(1), Blob::from_data("x"), Weak::new());
        req.set(id(1), Delivery::Handle(handle));
        assert!(matches!(req.take(id(1)), Some(Delivery::Handle(_))));
        assert!(matches!(req.take(id(1)), Some(Delivery::Handle(_))));
    }

    #[test]
    fn timeout_zero_does_not_block() {
        let req = RendezvousRequest::new(Mode::Wait, [id(1)]);
        let started = Instant::now();
        assert!(!req.wait(0));
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn positive_timeout_returns_false_if_never_satisfied() {
        let req = RendezvousRequest::new(Mode::Wait, [id(1)]);
        assert!(!req.wait(20));
    }
}
