//! Crate-wide error type for synchronization operations.

use thiserror::Error;

use crate::algebra::AlgebraError;
use crate::repo::RepoError;

/// Errors surfaced by graph algorithms and the state manager.
///
/// Algebra and invariant errors are fatal configuration or programming
/// defects and are never retried. Repository errors are propagated
/// unchanged from the collaborator. Push races are retried internally
/// up to a bound before surfacing as `PushRetriesExhausted`.
#[derive(Error, Debug)]
pub enum OtError {
    #[error("algebra error: {0}")]
    Algebra(#[from] AlgebraError),

    #[error("repository error: {0}")]
    Repository(#[from] RepoError),

    #[error("push rejected {attempts} times; remote head kept advancing")]
    PushRetriesExhausted { attempts: usize },

    #[error("commit {0} is not present in the local graph")]
    MissingCommit(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid session state: {0}")]
    InvalidState(&'static str),
}
