//! The local commit arena and its derived indices.

use std::collections::{BTreeSet, HashMap};

use crate::error::OtError;

use super::commit::{Commit, CommitId};

/// The set of commits known locally.
///
/// A flat arena keyed by id with edges as id references only, so cycles
/// are structurally impossible to dereference as ownership and traversals
/// run over explicit worklists. The graph grows monotonically as commits
/// are fetched; existing commits are never mutated.
#[derive(Clone, Debug, Default)]
pub struct CommitGraph<K, D> {
    commits: HashMap<K, Commit<K, D>>,
    /// Parent id -> ids of known children.
    children: HashMap<K, BTreeSet<K>>,
}

impl<K: CommitId, D: Clone + PartialEq> CommitGraph<K, D> {
    pub fn new() -> Self {
        Self {
            commits: HashMap::new(),
            children: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, id: &K) -> bool {
        self.commits.contains_key(id)
    }

    pub fn get(&self, id: &K) -> Option<&Commit<K, D>> {
        self.commits.get(id)
    }

    /// Like [`CommitGraph::get`] but missing commits are an error, for use
    /// mid-algorithm where the ancestry is expected to be loaded.
    pub fn require(&self, id: &K) -> Result<&Commit<K, D>, OtError> {
        self.commits
            .get(id)
            .ok_or_else(|| OtError::MissingCommit(format!("{id:?}")))
    }

    /// Insert a commit, updating the child index.
    ///
    /// Re-inserting an identical commit is a no-op; re-inserting an id
    /// with different content is an invariant violation, as is a level
    /// that does not exceed a known parent's.
    pub fn insert(&mut self, commit: Commit<K, D>) -> Result<(), OtError> {
        if let Some(existing) = self.commits.get(commit.id()) {
            if *existing == commit {
                return Ok(());
            }
            return Err(OtError::InvariantViolation(format!(
                "commit {:?} re-inserted with different content",
                commit.id()
            )));
        }

        for parent in commit.parent_ids() {
            if let Some(p) = self.commits.get(parent) {
                if commit.level() <= p.level() {
                    return Err(OtError::InvariantViolation(format!(
                        "commit {:?} level {} does not exceed parent {:?} level {}",
                        commit.id(),
                        commit.level(),
                        parent,
                        p.level()
                    )));
                }
            }
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(commit.id().clone());
        }

        self.commits.insert(commit.id().clone(), commit);
        Ok(())
    }

    /// Extend the graph with a batch of fetched commits.
    pub fn extend(&mut self, commits: impl IntoIterator<Item = Commit<K, D>>) -> Result<(), OtError> {
        for commit in commits {
            self.insert(commit)?;
        }
        Ok(())
    }

    /// Commits with no known children, in id order.
    pub fn heads(&self) -> BTreeSet<K> {
        self.commits
            .keys()
            .filter(|id| self.children.get(*id).map_or(true, |c| c.is_empty()))
            .cloned()
            .collect()
    }

    /// Parentless commits, in id order.
    pub fn roots(&self) -> BTreeSet<K> {
        self.commits
            .values()
            .filter(|c| c.is_root())
            .map(|c| c.id().clone())
            .collect()
    }

    /// Known children of a commit, in id order.
    pub fn children_of(&self, id: &K) -> BTreeSet<K> {
        self.children.get(id).cloned().unwrap_or_default()
    }

    pub fn ids(&self) -> impl Iterator<Item = &K> {
        self.commits.keys()
    }
}
