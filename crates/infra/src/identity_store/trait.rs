use std::sync::Arc;

use thiserror::Error;

use internhub_identity::{DisplayId, IdentityRecord, Prefix};

/// Identity store operation error.
///
/// These are **infrastructure errors**. `DisplayIdTaken` is the one the
/// allocator reacts to: it means another writer committed the same display id
/// first, so the sequence must be recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityStoreError {
    #[error("display id already assigned: {0}")]
    DisplayIdTaken(DisplayId),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Identity record storage.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - reject an insert whose `display_id` already exists with
///   [`IdentityStoreError::DisplayIdTaken`], atomically with respect to other
///   inserts (the uniqueness check and the write are one step)
/// - never modify or delete a record once inserted
/// - make an inserted record visible to `last_display_id` before `insert`
///   returns
pub trait IdentityStore: Send + Sync {
    /// Greatest display id whose first nine characters equal `prefix`.
    fn last_display_id(&self, prefix: &Prefix) -> Result<Option<DisplayId>, IdentityStoreError>;

    /// Insert a new record, failing if its display id is already assigned.
    fn insert(&self, record: IdentityRecord) -> Result<(), IdentityStoreError>;

    fn get(&self, display_id: &DisplayId) -> Result<Option<IdentityRecord>, IdentityStoreError>;

    /// All records under `prefix`, in display id order.
    fn list_by_prefix(&self, prefix: &Prefix) -> Result<Vec<IdentityRecord>, IdentityStoreError>;
}

impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    fn last_display_id(&self, prefix: &Prefix) -> Result<Option<DisplayId>, IdentityStoreError> {
        (**self).last_display_id(prefix)
    }

    fn insert(&self, record: IdentityRecord) -> Result<(), IdentityStoreError> {
        (**self).insert(record)
    }

    fn get(&self, display_id: &DisplayId) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        (**self).get(display_id)
    }

    fn list_by_prefix(&self, prefix: &Prefix) -> Result<Vec<IdentityRecord>, IdentityStoreError> {
        (**self).list_by_prefix(prefix)
    }
}
