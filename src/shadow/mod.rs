//! Shadow copy of the topic graph and the sync reconciler

pub mod reconciler;
pub mod sqlite;
pub mod traits;

pub use reconciler::{SyncOutcome, SyncReconciler, DEFAULT_DEBOUNCE};
pub use sqlite::SqliteShadowStore;
pub use traits::{slugify, ShadowError, ShadowStore, ShadowTopic, SyncLogEntry, SyncType};

#[cfg(test)]
pub(crate) mod mock;
