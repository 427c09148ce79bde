//! Pure worklist traversals of the commit graph.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use crate::error::OtError;
use crate::graph::{CommitGraph, CommitId};

/// Heap entry ordered by (level, id) so walks proceed from the newest
/// commits downward, with id as the deterministic tie-break.
#[derive(PartialEq, Eq)]
struct Entry<K> {
    level: u64,
    id: K,
}

impl<K: Ord> Ord for Entry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.level, &self.id).cmp(&(other.level, &other.id))
    }
}

impl<K: Ord> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the nearest common ancestor of a set of heads.
///
/// Backward BFS from all heads simultaneously, visiting commits in
/// descending level order and tagging each with the subset of heads that
/// reached it. The first commit reached by every head is the base; equal
/// levels are broken by id, so every replica computing this over the same
/// graph reaches the same answer.
pub fn find_merge_base<K, D>(graph: &CommitGraph<K, D>, heads: &BTreeSet<K>) -> Result<K, OtError>
where
    K: CommitId,
    D: Clone + PartialEq,
{
    if heads.is_empty() {
        return Err(OtError::InvariantViolation(
            "merge base of an empty head set".into(),
        ));
    }

    let mut reached: HashMap<K, BTreeSet<usize>> = HashMap::new();
    let mut heap: BinaryHeap<Entry<K>> = BinaryHeap::new();
    let mut processed: HashSet<K> = HashSet::new();

    for (tag, head) in heads.iter().enumerate() {
        let commit = graph.require(head)?;
        reached.entry(head.clone()).or_default().insert(tag);
        heap.push(Entry {
            level: commit.level(),
            id: head.clone(),
        });
    }

    while let Some(Entry { id, .. }) = heap.pop() {
        if !processed.insert(id.clone()) {
            continue;
        }
        // Level order guarantees every child of `id` reachable from the
        // heads has already been processed, so its tag set is complete.
        let tags = reached.get(&id).cloned().unwrap_or_default();
        if tags.len() == heads.len() {
            return Ok(id);
        }
        let commit = graph.require(&id)?;
        for parent in commit.parent_ids() {
            let parent_commit = graph.require(parent)?;
            reached
                .entry(parent.clone())
                .or_default()
                .extend(tags.iter().copied());
            heap.push(Entry {
                level: parent_commit.level(),
                id: parent.clone(),
            });
        }
    }

    Err(OtError::InvariantViolation(
        "heads share no common ancestor".into(),
    ))
}

/// Concatenate the edge diffs transforming the value at `from` into the
/// value at `to`.
///
/// Walks parent edges backward from `to` until it meets `from`, then
/// replays the discovered path forward. When merges offer several paths,
/// the walk picks one deterministically (breadth-first, parents in id
/// order); any path is equivalent because merge edges were constructed to
/// converge.
pub fn path_diffs<K, D>(graph: &CommitGraph<K, D>, from: &K, to: &K) -> Result<Vec<D>, OtError>
where
    K: CommitId,
    D: Clone + PartialEq,
{
    if from == to {
        return Ok(Vec::new());
    }

    let from_level = graph.require(from)?.level();
    graph.require(to)?;

    // Discovered commit -> the child through which it was found.
    let mut pred: HashMap<K, K> = HashMap::new();
    let mut queue: VecDeque<K> = VecDeque::from([to.clone()]);
    let mut found = false;

    'search: while let Some(id) = queue.pop_front() {
        let commit = graph.require(&id)?;
        for parent in commit.parent_ids() {
            if pred.contains_key(parent) {
                continue;
            }
            // Ancestors below `from`'s level cannot lead back to it.
            if graph.require(parent)?.level() < from_level {
                continue;
            }
            pred.insert(parent.clone(), id.clone());
            if parent == from {
                found = true;
                break 'search;
            }
            queue.push_back(parent.clone());
        }
    }

    if !found {
        return Err(OtError::InvariantViolation(format!(
            "no path from {from:?} to {to:?}"
        )));
    }

    let mut diffs = Vec::new();
    let mut current = from.clone();
    while current != *to {
        let child = pred
            .get(&current)
            .cloned()
            .ok_or_else(|| OtError::InvariantViolation("broken path reconstruction".into()))?;
        let edge = graph
            .require(&child)?
            .parents()
            .get(&current)
            .ok_or_else(|| OtError::InvariantViolation("path edge missing".into()))?;
        diffs.extend(edge.iter().cloned());
        current = child;
    }
    Ok(diffs)
}

/// Find the root anchoring `from`'s history, deterministically (smallest
/// id when several roots are reachable).
pub fn find_root<K, D>(graph: &CommitGraph<K, D>, from: &K) -> Result<K, OtError>
where
    K: CommitId,
    D: Clone + PartialEq,
{
    let mut seen: HashSet<K> = HashSet::from([from.clone()]);
    let mut stack: Vec<K> = vec![from.clone()];
    let mut roots: BTreeSet<K> = BTreeSet::new();

    while let Some(id) = stack.pop() {
        let commit = graph.require(&id)?;
        if commit.is_root() {
            roots.insert(id);
            continue;
        }
        for parent in commit.parent_ids() {
            if seen.insert(parent.clone()) {
                stack.push(parent.clone());
            }
        }
    }

    roots
        .iter()
        .next()
        .cloned()
        .ok_or_else(|| OtError::InvariantViolation("commit has no root ancestor".into()))
}
