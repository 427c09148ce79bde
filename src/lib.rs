// Conflux - Optimistic Concurrent Editing Engine

//! Generic optimistic concurrent editing.
//!
//! Independent actors each hold a local copy of some value, edit it
//! through domain-defined diffs, and converge to a consistent shared
//! value after exchanging commits out of order, concurrently, and through
//! partitions. The engine is a diff algebra plus a commit-DAG
//! synchronization protocol: a domain plugs in a closed diff enum with
//! four small functions per variant pair (transform, squash, invert,
//! emptiness) and gets merging, rebasing and push/pull synchronization
//! for free.
//!
//! - [`algebra`]: the per-variant-pair dispatch registry ([`OtSystem`]).
//! - [`graph`]: immutable commits and the local DAG ([`CommitGraph`]).
//! - [`algorithms`]: merge base, path diffs, merge and rebase.
//! - [`repo`]: the repository collaborator contract plus an in-memory
//!   implementation for tests and demos.
//! - [`sync`]: the client session ([`OtStateManager`]) with working
//!   diffs, commit, push, pull, fetch and checkout.
//!
//! Convergence is achieved after the fact via merge and rebase rather
//! than prevented up front: actors never block waiting for each other,
//! and a shared repository needs no locking beyond atomic head advance.

pub mod algebra;
pub mod algorithms;
pub mod error;
pub mod graph;
pub mod repo;
pub mod sync;

pub use algebra::{
    AlgebraError, ConflictResolution, Diff, OtSystem, OtSystemBuilder, TransformOutcome,
    TransformResult,
};
pub use algorithms::{find_merge_base, find_root, path_diffs, OtAlgorithms};
pub use error::OtError;
pub use graph::{Commit, CommitGraph, CommitId};
pub use repo::{InMemoryRepository, OtRepository, PushOutcome, RepoError};
pub use sync::{OtState, OtStateManager, SyncStatus};
