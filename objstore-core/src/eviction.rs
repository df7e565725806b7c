//! LRU ordering over unreferenced resident entries.
//!
//! Mirrors the intrusive doubly-linked list used by this crate's
//! sibling in-memory engine: a `Vec` of nodes plus a free list, so
//! unlink/relink never touches the allocator. Unlike that sibling's
//! shard-local index, this one is keyed directly by [`ObjectId`]
//! rather than by slot index, since the store has exactly one
//! eviction index, not one per shard.

use hashbrown::HashMap;
use objstore_common::ObjectId;

struct Node {
    id: ObjectId,
    size: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked LRU list of `(id, size)` pairs, most-recently-admitted
/// at the head. Only entries with a live-handle count of zero are ever
/// linked in here; admission and removal are driven entirely by the
/// store, which holds the single lock guarding this structure.
#[derive(Default)]
pub struct EvictionIndex {
    nodes: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<ObjectId, usize, ahash::RandomState>,
    head: Option<usize>,
    tail: Option<usize>,
    total_bytes: u64,
}

impl EvictionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held by entries linked into this index.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Links `id` in at the head. Panics if `id` is already linked —
    /// that would indicate a refcount/admission bug upstream.
    pub fn push_front(&mut self, id: ObjectId, size: u64) {
        debug_assert!(!self.index.contains_key(&id), "id already in eviction index");
        let slot = self.alloc_node(Node {
            id,
            size,
            prev: None,
            next: self.head,
        });
        if let Some(head) = self.head {
            self.nodes[head].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
        self.index.insert(id, slot);
        self.total_bytes += size;
    }

    /// Unlinks `id`, returning its size if it was present.
    pub fn remove(&mut self, id: &ObjectId) -> Option<u64> {
        let slot = self.index.remove(id)?;
        let (prev, next, size) = {
            let node = &self.nodes[slot];
            (node.prev, node.next, node.size)
        };
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.free_node(slot);
        self.total_bytes -= size;
        Some(size)
    }

    /// Removes and returns the id at the tail (the oldest, least
    /// recently admitted entry), if any.
    pub fn pop_back(&mut self) -> Option<(ObjectId, u64)> {
        let slot = self.tail?;
        let id = self.nodes[slot].id;
        let size = self.remove(&id)?;
        Some((id, size))
    }

    fn alloc_node(&mut self, node: Node) -> usize {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, slot: usize) {
        self.free.push(slot);
    }
}
