//! The client synchronization session.
//!
//! An [`OtStateManager`] holds one actor's view of a shared value: the
//! materialized value itself, uncommitted working diffs, and locally
//! created commits not yet pushed. All mutating operations are serialized
//! through a single mutex held across repository I/O, so no caller ever
//! observes a partially updated session.

mod manager;

pub use manager::OtStateManager;

/// The materialized domain value diffs fold into.
///
/// Implemented once per domain next to its diff type. `apply` is assumed
/// total: every registered diff must be applicable to every reachable
/// state.
pub trait OtState<D> {
    /// Reset to the initial (pre-history) value.
    fn init(&mut self);

    /// Fold one diff into the value.
    fn apply(&mut self, diff: &D);
}

/// Stable states of a session, derived from its working and pending sets.
///
/// Rebasing during `pull` or a push retry is a transient condition that
/// always settles back into one of these before the operation returns; it
/// is never observable from outside because the session lock spans the
/// whole operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// No revision checked out yet.
    Detached,
    /// No local edits beyond the checked-out revision.
    Clean,
    /// Uncommitted working diffs exist.
    Dirty,
    /// Working diffs were committed but not yet pushed.
    CommittedPending,
}
