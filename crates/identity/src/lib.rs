//! `internhub-identity`: identity records and Smart ID allocation rules.
//!
//! Everything here is pure: prefix computation, the base-36 codec, sequence
//! increments, display id parsing and account validation. Serializing the
//! read-increment-write step against a store is the job of `internhub-infra`.

pub mod account;
pub mod base36;
pub mod display_id;
pub mod error;
pub mod prefix;
pub mod role;
pub mod sequence;

pub use account::{AccountProfile, IdentityRecord, NewAccount, DEFAULT_DEPARTMENT};
pub use display_id::DisplayId;
pub use error::{AllocationError, AllocationResult};
pub use prefix::Prefix;
pub use role::RoleCode;
pub use sequence::{increment, Sequence};
