use thiserror::Error;

use crate::ObjectId;

/// Errors surfaced by the store's fallible operations.
///
/// Timeouts are deliberately absent from this enum: partial results on
/// timeout are normal and observable via null slots, not an error path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object {0} already exists")]
    AlreadyExists(ObjectId),

    #[error("out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: u64, available: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
