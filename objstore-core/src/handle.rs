use std::sync::{Arc, Weak};

use objstore_common::{Blob, ObjectId};

use crate::store::StoreGuts;

/// A returned, reference-counted view of a resident blob.
///
/// A handle's existence holds one count on its entry; dropping the last
/// clone of a handle is the sole trigger for the entry's refcount
/// decrement. Handles are `Clone`: cloning bumps this object's own
/// `Arc` strong count, not the store's per-entry refcount again — the
/// store was only ever asked to pin the entry once, when this handle
/// was first produced. This matters for duplicate ids resolved through
/// the pending-get registry, where several result slots end up sharing
/// one underlying pin rather than each taking an independent one.
#[derive(Clone)]
pub struct Handle(pub(crate) Arc<HandleInner>);

pub(crate) struct HandleInner {
    pub(crate) id: ObjectId,
    pub(crate) blob: Blob,
    pub(crate) store: Weak<StoreGuts>,
}

impl Handle {
    pub(crate) fn new(id: ObjectId, blob: Blob, store: Weak<StoreGuts>) -> Self {
        Self(Arc::new(HandleInner { id, blob, store }))
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn data(&self) -> Option<&bytes::Bytes> {
        self.0.blob.data()
    }

    pub fn metadata(&self) -> Option<&bytes::Bytes> {
        self.0.blob.metadata()
    }

    pub fn size(&self) -> u64 {
        self.0.blob.size()
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.release(self.id);
        }
    }
}
