//! The commit repository collaborator.
//!
//! The core never assumes a transport: anything satisfying
//! [`OtRepository`] can back a session, whether an HTTP service, a local
//! file store, or the in-process [`InMemoryRepository`].

mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::graph::{Commit, CommitId};

pub use memory::InMemoryRepository;

/// Errors produced by a repository implementation.
///
/// Propagated unchanged through the core; the only retry the core itself
/// performs is the bounded push-race retry, which is driven by
/// [`PushOutcome::Rejected`], not by errors.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("commit not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Outcome of uploading a batch of commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome<K> {
    /// All commits were accepted.
    Ok,
    /// The remote head advanced past what this push assumed; nothing was
    /// uploaded. The caller should fetch, rebase and retry.
    Rejected { current_heads: BTreeSet<K> },
}

/// Storage and transport for commits, out of core scope.
#[async_trait]
pub trait OtRepository<K, D>: Send + Sync
where
    K: CommitId,
    D: Clone + Debug + Send + Sync + 'static,
{
    /// Mint a fresh, globally unique commit id.
    async fn create_commit_id(&self) -> Result<K, RepoError>;

    /// Upload commits, parent-before-child. Atomic: on rejection nothing
    /// is kept, so no partial upload is ever left as an isolated head.
    async fn push(&self, commits: Vec<Commit<K, D>>) -> Result<PushOutcome<K>, RepoError>;

    /// Current remote heads.
    async fn heads(&self) -> Result<BTreeSet<K>, RepoError>;

    async fn load_commit(&self, id: &K) -> Result<Commit<K, D>, RepoError>;

    /// Store the full diff sequence reconstructing the value at `id` from
    /// the initial state.
    async fn save_snapshot(&self, id: K, diffs: Vec<D>) -> Result<(), RepoError>;

    async fn load_snapshot(&self, id: &K) -> Result<Option<Vec<D>>, RepoError>;

    /// Mint a commit with a fresh id.
    async fn create_commit(
        &self,
        parents: BTreeMap<K, Vec<D>>,
        level: u64,
    ) -> Result<Commit<K, D>, RepoError> {
        let id = self.create_commit_id().await?;
        Ok(Commit::new(id, parents, level))
    }
}
