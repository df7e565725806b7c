//! Shared types for the object store: identifiers, blobs, and errors.
//!
//! This crate has no locking or eviction logic of its own — it is the
//! vocabulary that `objstore-core` and its callers share.

mod blob;
mod error;
mod id;

pub use blob::Blob;
pub use error::StoreError;
pub use id::{ObjectId, OBJECT_ID_LEN};
