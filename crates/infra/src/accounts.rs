//! Account creation on top of the allocator.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use internhub_core::DomainError;
use internhub_identity::{AllocationError, DisplayId, IdentityRecord, NewAccount, Prefix};

use crate::allocator::IdentityAllocator;
use crate::identity_store::{IdentityStore, IdentityStoreError};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Store(#[from] IdentityStoreError),
}

/// Opens accounts and looks them up by display id.
#[derive(Debug)]
pub struct AccountService<S> {
    allocator: IdentityAllocator<S>,
}

impl<S> AccountService<S>
where
    S: IdentityStore,
{
    pub fn new(allocator: IdentityAllocator<S>) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &IdentityAllocator<S> {
        &self.allocator
    }

    /// Validate `cmd`, allocate its display id and persist the record.
    ///
    /// Validation happens before allocation, so a rejected request never
    /// consumes a sequence.
    #[instrument(skip(self, cmd), fields(role = %cmd.role), err)]
    pub fn create_account(&self, cmd: &NewAccount) -> Result<IdentityRecord, AccountError> {
        let profile = cmd.validate()?;
        let record = self
            .allocator
            .allocate_record(cmd.role, cmd.creation_date(), Some(profile))?;
        Ok(record)
    }

    pub fn create_superuser(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<IdentityRecord, AccountError> {
        self.create_account(&NewAccount::superuser(email, first_name, last_name, occurred_at))
    }

    pub fn find(&self, display_id: &DisplayId) -> Result<IdentityRecord, AccountError> {
        self.allocator
            .store()
            .get(display_id)?
            .ok_or_else(|| DomainError::not_found().into())
    }

    pub fn list_for_prefix(&self, prefix: &Prefix) -> Result<Vec<IdentityRecord>, AccountError> {
        Ok(self.allocator.store().list_by_prefix(prefix)?)
    }
}
