use objstore_common::Blob;

/// A resident blob plus its live-handle count.
///
/// An entry's count is zero iff it is linked into the eviction index;
/// the store's main lock is what actually enforces that invariant, this
/// type just carries the two fields together.
pub struct EntryRecord {
    pub blob: Blob,
    pub refcount: u32,
}

impl EntryRecord {
    pub fn new(blob: Blob) -> Self {
        Self { blob, refcount: 0 }
    }

    pub fn size(&self) -> u64 {
        self.blob.size()
    }
}
