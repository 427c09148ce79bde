//! Merge and rebase over the commit DAG.
//!
//! The traversal primitives are pure functions of the graph, so they are
//! safe to run anywhere and idempotent on the same inputs; the
//! [`OtAlgorithms`] component layers repository access (ancestry loading,
//! commit minting) on top of them.

mod merge;
mod traverse;

pub use merge::OtAlgorithms;
pub use traverse::{find_merge_base, find_root, path_diffs};
