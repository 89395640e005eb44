//! Persistence for registry snapshots.
//!
//! The registry talks to a [`StateStore`]; [`Storage`] is the ReDB-backed
//! implementation used by the daemon and integration tests.

pub mod redb;

pub use self::redb::Storage;

use crate::error::RecoveryResult;
use crate::recovery::types::RecoverySnapshot;

/// Durable home for the registry state.
///
/// `save` is called with the registry lock held, after every successful
/// mutation and before it becomes visible.
pub trait StateStore: Send + Sync {
    fn load(&self) -> RecoveryResult<Option<RecoverySnapshot>>;
    fn save(&self, snapshot: &RecoverySnapshot) -> RecoveryResult<()>;
}
