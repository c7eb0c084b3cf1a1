//! Infrastructure layer: identity storage, allocation and account creation.

pub mod accounts;
pub mod allocator;
pub mod config;
pub mod identity_store;


pub use accounts::{AccountError, AccountService};
pub use allocator::IdentityAllocator;
pub use config::AllocatorConfig;
pub use identity_store::{
    IdentityStore, IdentityStoreError, InMemoryIdentityStore, PostgresIdentityStore,
};
