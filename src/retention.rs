//! Which UI state survives a flatten pass.
//!
//! [`resolve_scope`] classifies surfaces, [`RetentionStore`] is the bounded
//! LRU of retained state with lock/pin protection, and
//! [`RetentionCoordinator`] feeds flatten results into the store.

mod coordinator;
pub(crate) mod scope;
mod store;

pub use coordinator::RetentionCoordinator;
pub use scope::{CacheScope, resolve_scope};
pub use store::{EvictionReport, Protection, RetentionEntry, RetentionError, RetentionStore};
