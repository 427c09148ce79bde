//! Commit nodes.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a commit.
///
/// Unique and totally ordered: the order is what lets every replica break
/// merge-base and conflict ties identically. Implemented for anything
/// comparable and hashable (uuids, integers, digests).
pub trait CommitId: Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static {}

impl<T: Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static> CommitId for T {}

/// An immutable node in the commit DAG.
///
/// Each parent edge is labeled with the diffs separating that parent's
/// value from this commit's value. A commit with no parents is a root; one
/// with several parents is a merge. `level` is a topological priority:
/// strictly greater than every parent's level, it lets graph walks proceed
/// in level order without recursion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "K: serde::Deserialize<'de> + Ord, D: serde::Deserialize<'de>"))]
pub struct Commit<K, D> {
    id: K,
    parents: BTreeMap<K, Vec<D>>,
    level: u64,
    timestamp: DateTime<Utc>,
}

impl<K: CommitId, D> Commit<K, D> {
    pub fn new(id: K, parents: BTreeMap<K, Vec<D>>, level: u64) -> Self {
        Self {
            id,
            parents,
            level,
            timestamp: Utc::now(),
        }
    }

    /// A parentless commit anchoring a new history.
    pub fn root(id: K) -> Self {
        Self::new(id, BTreeMap::new(), 0)
    }

    pub fn id(&self) -> &K {
        &self.id
    }

    /// Parent id -> diffs separating that parent from this commit.
    pub fn parents(&self) -> &BTreeMap<K, Vec<D>> {
        &self.parents
    }

    pub fn parent_ids(&self) -> impl Iterator<Item = &K> {
        self.parents.keys()
    }

    pub fn level(&self) -> u64 {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}
