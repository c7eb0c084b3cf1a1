//! Smart ID allocation against an [`IdentityStore`].
//!
//! ## Allocation Flow
//!
//! ```text
//! (role, creation_date)
//!   ↓
//! 1. Compute the 9-character prefix
//!   ↓
//! 2. Take the prefix lock (bounded wait)
//!   ↓
//! 3. Read the greatest display id under the prefix
//!   ↓
//! 4. Increment its sequence (CapacityExhausted past "ZZZ")
//!   ↓
//! 5. Insert the record; the store rejects a display id that is already taken
//!   ↓
//! 6. Taken? go back to 3, at most `max_attempts` times
//! ```
//!
//! The prefix lock serializes allocators sharing this process. The store's
//! uniqueness check catches writers in other processes; losing that race only
//! costs a retry, never a duplicate. Locks are per prefix, so allocations for
//! different roles or days never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn, Span};

use internhub_core::InternalId;
use internhub_identity::{
    AccountProfile, AllocationError, AllocationResult, DisplayId, IdentityRecord, Prefix, RoleCode,
};

use crate::config::AllocatorConfig;
use crate::identity_store::{IdentityStore, IdentityStoreError};

/// Prefix locks are dropped from the table once it grows past this size and
/// nobody holds them.
const PRUNE_THRESHOLD: usize = 256;

/// One mutex per prefix, created on first use.
#[derive(Debug, Default)]
pub(crate) struct PrefixLocks {
    inner: Mutex<HashMap<Prefix, Arc<Mutex<()>>>>,
}

impl PrefixLocks {
    pub(crate) fn for_prefix(&self, prefix: &Prefix) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock();
        if locks.len() >= PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(prefix.clone()).or_default().clone()
    }
}

/// Assigns display ids and persists the identity records that carry them.
#[derive(Debug)]
pub struct IdentityAllocator<S> {
    store: S,
    pub(crate) locks: PrefixLocks,
    config: AllocatorConfig,
}

impl<S> IdentityAllocator<S> {
    pub fn new(store: S, config: AllocatorConfig) -> Self {
        Self {
            store,
            locks: PrefixLocks::default(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }
}

impl<S> IdentityAllocator<S>
where
    S: IdentityStore,
{
    /// Allocate a display id for a new identity with no account details.
    ///
    /// The identity record is persisted before this returns.
    pub fn allocate(&self, role: RoleCode, creation_date: NaiveDate) -> AllocationResult<DisplayId> {
        self.allocate_record(role, creation_date, None)
            .map(IdentityRecord::into_display_id)
    }

    /// Allocate a display id and persist a record carrying `profile`.
    ///
    /// On error nothing is persisted.
    #[instrument(
        skip(self, profile),
        fields(prefix = tracing::field::Empty, attempts = tracing::field::Empty),
        err
    )]
    pub fn allocate_record(
        &self,
        role: RoleCode,
        creation_date: NaiveDate,
        profile: Option<AccountProfile>,
    ) -> AllocationResult<IdentityRecord> {
        let prefix = Prefix::compute(role, creation_date);
        let span = Span::current();
        span.record("prefix", prefix.as_str());

        let lock = self.locks.for_prefix(&prefix);
        let _guard = lock.try_lock_for(self.config.lock_timeout).ok_or_else(|| {
            AllocationError::allocation_failed(
                prefix.as_str(),
                format!("timed out after {:?} waiting for prefix lock", self.config.lock_timeout),
            )
        })?;

        let internal_id = InternalId::new();
        for attempt in 1..=self.config.max_attempts {
            span.record("attempts", attempt);

            let last = self
                .store
                .last_display_id(&prefix)
                .map_err(|e| store_failure(&prefix, e))?;
            let candidate = prefix.next_display_id(last.as_ref())?;
            debug!(attempt, candidate = %candidate, "attempting display id");

            let record = IdentityRecord::new(internal_id, candidate, creation_date, profile.clone())
                .map_err(|e| AllocationError::allocation_failed(prefix.as_str(), e.to_string()))?;
            match self.store.insert(record.clone()) {
                Ok(()) => {
                    info!(display_id = %record.display_id(), "display id allocated");
                    return Ok(record);
                }
                Err(IdentityStoreError::DisplayIdTaken(taken)) => {
                    warn!(attempt, display_id = %taken, "display id taken by another writer, retrying");
                    if attempt < self.config.max_attempts {
                        std::thread::sleep(self.config.backoff_for(attempt));
                    }
                }
                Err(e) => return Err(store_failure(&prefix, e)),
            }
        }

        Err(self.config.contention_exhausted(&prefix))
    }
}

fn store_failure(prefix: &Prefix, err: IdentityStoreError) -> AllocationError {
    AllocationError::allocation_failed(prefix.as_str(), err.to_string())
}
