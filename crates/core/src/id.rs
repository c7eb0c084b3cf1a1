//! Opaque internal identifiers.
//!
//! Internal ids are database-only keys. They are never shown to people; the
//! human-readable `DisplayId` lives in `internhub-identity`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Internal identifier of an identity record (random 128-bit value).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InternalId(Uuid);

impl InternalId {
    /// Create a new random identifier (UUIDv4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InternalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for InternalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for InternalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<InternalId> for Uuid {
    fn from(value: InternalId) -> Self {
        value.0
    }
}

impl FromStr for InternalId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("InternalId: {e}")))?;
        Ok(Self(uuid))
    }
}
