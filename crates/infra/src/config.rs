//! Allocator tuning knobs.

use std::time::Duration;

use internhub_core::{DomainError, DomainResult};
use internhub_identity::{AllocationError, Prefix};

/// Limits applied to every allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Read-increment-write attempts before giving up with `AllocationFailed`.
    pub max_attempts: u32,
    /// Longest wait for the per-prefix lock (in-process lock, or the counter
    /// row lock in Postgres).
    pub lock_timeout: Duration,
    /// Pause before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_timeout: Duration::from_secs(2),
            retry_backoff: Duration::from_millis(10),
        }
    }
}

impl AllocatorConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.max_attempts == 0 {
            return Err(DomainError::validation("max_attempts must be at least 1"));
        }
        if self.lock_timeout.is_zero() {
            return Err(DomainError::validation("lock_timeout must be non-zero"));
        }
        Ok(())
    }

    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }

    /// Error returned once every attempt lost its display id to another writer.
    pub(crate) fn contention_exhausted(&self, prefix: &Prefix) -> AllocationError {
        AllocationError::allocation_failed(
            prefix.as_str(),
            format!("display id still contended after {} attempts", self.max_attempts),
        )
    }
}
