//! Storage module
//!
//! Device-local state that lives outside the database.

pub mod unlock_cache;

pub use unlock_cache::{BoundedUnlockCache, UnlockCache};
