//! Durable storage for identity records.
//!
//! The allocator needs exactly two things from a backend: the greatest display
//! id under a prefix, and an insert that refuses a display id that is already
//! taken. Everything else here serves lookups.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;
pub use r#trait::{IdentityStore, IdentityStoreError};
