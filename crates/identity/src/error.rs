//! Allocation error taxonomy.

use thiserror::Error;

/// Result type used by the codec and the allocator.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Why a display id could not be produced.
///
/// Every variant is scoped to a single allocation attempt. Callers treat any of
/// them as "the account was not created".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Bad codec input: a negative number, an empty string, or a character
    /// outside `[0-9A-Za-z]`.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every 3-character sequence for this prefix has been handed out.
    #[error("sequence space exhausted for prefix {prefix}")]
    CapacityExhausted { prefix: String },

    /// The read-increment-write step could not be serialized within the lock
    /// timeout or retry budget, or the store refused the write.
    #[error("allocation failed for prefix {prefix}: {reason}")]
    AllocationFailed { prefix: String, reason: String },
}

impl AllocationError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn capacity_exhausted(prefix: impl Into<String>) -> Self {
        Self::CapacityExhausted {
            prefix: prefix.into(),
        }
    }

    pub fn allocation_failed(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AllocationFailed {
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }
}
