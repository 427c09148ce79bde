//! Merge and rebase against a repository.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::algebra::{Diff, OtSystem, TransformResult};
use crate::error::OtError;
use crate::graph::{Commit, CommitGraph, CommitId};
use crate::repo::OtRepository;

use super::traverse::{find_merge_base, path_diffs};

/// Merge/rebase component: the diff algebra plus repository access.
///
/// The graph computations themselves are pure; the repository is only
/// consulted to load missing ancestry and to mint commit ids. Methods that
/// take a graph mutate it only after their last await, so a cancelled call
/// leaves it untouched.
pub struct OtAlgorithms<K, D: Diff, R> {
    system: Arc<OtSystem<D>>,
    repository: Arc<R>,
    _key: PhantomData<K>,
}

impl<K, D, R> OtAlgorithms<K, D, R>
where
    K: CommitId,
    D: Diff,
    R: OtRepository<K, D>,
{
    pub fn new(system: Arc<OtSystem<D>>, repository: Arc<R>) -> Self {
        Self {
            system,
            repository,
            _key: PhantomData,
        }
    }

    pub fn system(&self) -> &OtSystem<D> {
        &self.system
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Load commits reachable from `from` that the graph does not know
    /// yet, walking parent edges until known territory.
    ///
    /// Returns the fetched commits without touching the graph; the caller
    /// inserts them synchronously.
    pub async fn load_missing(
        &self,
        graph: &CommitGraph<K, D>,
        from: &BTreeSet<K>,
    ) -> Result<Vec<Commit<K, D>>, OtError> {
        let mut queued: HashSet<K> = HashSet::new();
        let mut queue: VecDeque<K> = VecDeque::new();
        for id in from {
            if !graph.contains(id) && queued.insert(id.clone()) {
                queue.push_back(id.clone());
            }
        }

        let mut fetched = Vec::new();
        while let Some(id) = queue.pop_front() {
            let commit = self.repository.load_commit(&id).await?;
            for parent in commit.parent_ids() {
                if !graph.contains(parent) && queued.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
            fetched.push(commit);
        }
        Ok(fetched)
    }

    /// Merge a set of heads into a new commit.
    ///
    /// Computes the merge base, the per-head branch diffs, and transforms
    /// every branch so each head gets the tail taking it to the common
    /// merged state. The merge commit's parents are all heads, each edge
    /// labeled with its tail. This is the only place conflicts are
    /// resolved silently; resolutions are logged.
    pub async fn merge_heads(
        &self,
        graph: &mut CommitGraph<K, D>,
        heads: &BTreeSet<K>,
    ) -> Result<Commit<K, D>, OtError> {
        if heads.is_empty() {
            return Err(OtError::InvariantViolation(
                "merge of an empty head set".into(),
            ));
        }

        let fetched = self.load_missing(graph, heads).await?;
        let merge_id = self.repository.create_commit_id().await?;
        graph.extend(fetched)?;

        let base = find_merge_base(graph, heads)?;
        log::debug!("merging {} heads at base {base:?}", heads.len());

        // `merged` accumulates the diffs from the base to the merged
        // state; each head's tail is extended whenever a later branch
        // contributes new complements.
        let mut merged: Vec<D> = Vec::new();
        let mut tails: Vec<(K, Vec<D>)> = Vec::new();
        for head in heads {
            let branch = path_diffs(graph, &base, head)?;
            if tails.is_empty() {
                tails.push((head.clone(), Vec::new()));
                merged = branch;
                continue;
            }
            let result = self.system.transform(&merged, &branch)?;
            if let Some(winner) = result.resolution {
                log::warn!(
                    "merge at base {base:?} hit a conflict; resolved for the {winner:?} side"
                );
            }
            for (_, tail) in &mut tails {
                tail.extend(result.right.iter().cloned());
            }
            merged.extend(result.right.iter().cloned());
            tails.push((head.clone(), result.left));
        }

        let mut max_level = 0;
        for head in heads {
            max_level = max_level.max(graph.require(head)?.level());
        }

        let mut parents: BTreeMap<K, Vec<D>> = BTreeMap::new();
        for (head, tail) in tails {
            parents.insert(head, self.system.squash(&tail)?);
        }

        let commit = Commit::new(merge_id, parents, max_level + 1);
        graph.insert(commit.clone())?;
        Ok(commit)
    }

    /// Re-express `diffs` as if they had been made starting from
    /// `new_base` instead of `old_base`.
    ///
    /// The result's `left` is the rebased sequence; its `right` is the
    /// complement that carries a value sitting on top of `diffs` over to
    /// the rebased line. Pure given loaded ancestry.
    pub fn rebase(
        &self,
        graph: &CommitGraph<K, D>,
        diffs: &[D],
        old_base: &K,
        new_base: &K,
    ) -> Result<TransformResult<D>, OtError> {
        let divergence = path_diffs(graph, old_base, new_base)?;
        Ok(self.system.transform(diffs, &divergence)?)
    }
}
