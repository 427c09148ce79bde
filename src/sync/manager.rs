//! The synchronization state machine.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::algebra::Diff;
use crate::algorithms::{find_root, path_diffs, OtAlgorithms};
use crate::error::OtError;
use crate::graph::{Commit, CommitGraph, CommitId};
use crate::repo::{OtRepository, PushOutcome};

use super::{OtState, SyncStatus};

const DEFAULT_MAX_PUSH_ATTEMPTS: usize = 3;

/// One actor's editing session against a shared repository.
///
/// Single-writer: every mutating operation locks the session for its whole
/// duration, including repository awaits. Operations stage repository I/O
/// into local buffers and mutate the session only in a synchronous tail
/// after their last await, so cancelling an in-flight call (by dropping
/// its future) leaves the session and its graph exactly as before, and
/// any error is atomic-or-nothing.
pub struct OtStateManager<K, D: Diff, S, R> {
    algorithms: Arc<OtAlgorithms<K, D, R>>,
    max_push_attempts: usize,
    session: Mutex<Session<K, D, S>>,
}

struct Session<K, D, S> {
    /// Last revision the repository is known to have; rebase divergences
    /// are computed from here.
    base: Option<K>,
    /// Local tip: the last pending commit, or `base` when none.
    revision: Option<K>,
    level: u64,
    /// Uncommitted local edits, already folded into `state`.
    working: Vec<D>,
    /// Locally created commits not yet pushed, parent-before-child.
    pending: Vec<Commit<K, D>>,
    state: S,
    graph: CommitGraph<K, D>,
}

impl<K: CommitId, D, S> Session<K, D, S> {
    fn position(&self) -> Result<(K, K), OtError> {
        match (&self.base, &self.revision) {
            (Some(base), Some(revision)) => Ok((base.clone(), revision.clone())),
            _ => Err(OtError::InvalidState("no revision checked out")),
        }
    }
}

/// Staged result of rebasing the local chain onto new remote heads.
struct RebasePlan<K, D> {
    base: K,
    tip: K,
    level: u64,
    pending: Vec<Commit<K, D>>,
    working: Vec<D>,
    /// Complement to fold into the materialized value.
    value_tail: Vec<D>,
}

impl<K, D, S, R> OtStateManager<K, D, S, R>
where
    K: CommitId,
    D: Diff,
    S: OtState<D> + Send,
    R: OtRepository<K, D>,
{
    pub fn new(algorithms: Arc<OtAlgorithms<K, D, R>>, state: S) -> Self {
        Self {
            algorithms,
            max_push_attempts: DEFAULT_MAX_PUSH_ATTEMPTS,
            session: Mutex::new(Session {
                base: None,
                revision: None,
                level: 0,
                working: Vec::new(),
                pending: Vec::new(),
                state,
                graph: CommitGraph::new(),
            }),
        }
    }

    /// Override the bound on automatic push retries.
    pub fn with_max_push_attempts(mut self, attempts: usize) -> Self {
        self.max_push_attempts = attempts;
        self
    }

    // === Session inspection ===

    pub async fn status(&self) -> SyncStatus {
        let session = self.session.lock().await;
        if session.revision.is_none() {
            SyncStatus::Detached
        } else if !session.working.is_empty() {
            SyncStatus::Dirty
        } else if !session.pending.is_empty() {
            SyncStatus::CommittedPending
        } else {
            SyncStatus::Clean
        }
    }

    /// The local tip revision, if attached.
    pub async fn revision(&self) -> Option<K> {
        self.session.lock().await.revision.clone()
    }

    pub async fn working_diffs(&self) -> Vec<D> {
        self.session.lock().await.working.clone()
    }

    pub async fn has_pending_commits(&self) -> bool {
        !self.session.lock().await.pending.is_empty()
    }

    /// Read the materialized value under the session lock.
    pub async fn with_state<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let session = self.session.lock().await;
        f(&session.state)
    }

    // === Local editing ===

    /// Append a diff to the working set and fold it into the value
    /// immediately, so reads always reflect local intent.
    pub async fn add(&self, diff: D) -> Result<(), OtError> {
        self.add_all(vec![diff]).await
    }

    pub async fn add_all(&self, diffs: Vec<D>) -> Result<(), OtError> {
        let mut session = self.session.lock().await;
        session.position()?;
        for diff in diffs {
            session.state.apply(&diff);
            session.working.push(diff);
        }
        Ok(())
    }

    /// Snapshot the working diffs into a new pending commit.
    ///
    /// The working set is squashed first; if it squashes away entirely,
    /// no commit is created and `None` is returned.
    pub async fn commit(&self) -> Result<Option<K>, OtError> {
        let mut session = self.session.lock().await;
        let (_, tip) = session.position()?;

        let diffs = self.algorithms.system().squash(&session.working)?;
        if diffs.is_empty() {
            session.working.clear();
            return Ok(None);
        }

        let level = session.level + 1;
        let commit = self
            .algorithms
            .repository()
            .create_commit(BTreeMap::from([(tip, diffs)]), level)
            .await?;

        session.graph.insert(commit.clone())?;
        session.working.clear();
        session.revision = Some(commit.id().clone());
        session.level = level;
        let id = commit.id().clone();
        session.pending.push(commit);
        Ok(Some(id))
    }

    /// Discard the working diffs, returning the value to the current
    /// revision by applying their inverse.
    pub async fn reset(&self) -> Result<(), OtError> {
        let mut session = self.session.lock().await;
        session.position()?;
        let inverse = self.algorithms.system().invert(&session.working)?;
        for diff in &inverse {
            session.state.apply(diff);
        }
        session.working.clear();
        Ok(())
    }

    // === Repository synchronization ===

    /// Upload pending commits, retrying through push races.
    ///
    /// A rejection means the remote head advanced past this session's
    /// base: the new commits are fetched, pending and working diffs are
    /// rebased onto the new head, and the push is retried, up to the
    /// configured bound. Local edits are never dropped.
    pub async fn push(&self) -> Result<(), OtError> {
        let mut session = self.session.lock().await;
        let (mut base, mut tip) = session.position()?;
        if session.pending.is_empty() {
            return Ok(());
        }

        let mut graph = session.graph.clone();
        let mut level = session.level;
        let mut pending = session.pending.clone();
        let mut working = session.working.clone();
        let mut value_tail: Vec<D> = Vec::new();

        let mut attempts = 0;
        let pushed = loop {
            if pending.is_empty() {
                // Rebase dissolved the pending chain; nothing to upload.
                break true;
            }
            if attempts == self.max_push_attempts {
                break false;
            }
            attempts += 1;
            match self.algorithms.repository().push(pending.clone()).await? {
                PushOutcome::Ok => break true,
                PushOutcome::Rejected { current_heads } => {
                    log::debug!(
                        "push attempt {attempts} rejected; rebasing onto {} remote head(s)",
                        current_heads.len()
                    );
                    let fetched = self.algorithms.load_missing(&graph, &current_heads).await?;
                    graph.extend(fetched)?;
                    let plan = self
                        .rebase_staged(&mut graph, &base, &tip, &working, &current_heads)
                        .await?;
                    base = plan.base;
                    tip = plan.tip;
                    level = plan.level;
                    pending = plan.pending;
                    working = plan.working;
                    value_tail.extend(plan.value_tail);
                }
            }
        };

        if !pushed {
            return Err(OtError::PushRetriesExhausted {
                attempts: self.max_push_attempts,
            });
        }

        session.graph = graph;
        session.base = Some(tip.clone());
        session.revision = Some(tip);
        session.level = level;
        session.pending = Vec::new();
        session.working = working;
        for diff in &value_tail {
            session.state.apply(diff);
        }
        Ok(())
    }

    /// Download new commits into the local graph. Never touches the
    /// materialized value or the working diffs.
    pub async fn fetch(&self) -> Result<BTreeSet<K>, OtError> {
        let mut session = self.session.lock().await;
        session.position()?;
        let heads = self.algorithms.repository().heads().await?;
        let fetched = self.algorithms.load_missing(&session.graph, &heads).await?;
        session.graph.extend(fetched)?;
        Ok(heads)
    }

    /// Fetch, then fold newly learned commits into the session.
    ///
    /// Divergent remote heads are merged; the pending chain and working
    /// diffs are rebased on top of the result, never dropped, and the
    /// materialized value is carried forward from its prior position.
    pub async fn pull(&self) -> Result<(), OtError> {
        let mut session = self.session.lock().await;
        let (base, tip) = session.position()?;
        let working = session.working.clone();

        let mut graph = session.graph.clone();
        let remote_heads = self.algorithms.repository().heads().await?;
        if remote_heads.is_empty() {
            return Err(OtError::InvalidState("repository has no heads"));
        }
        let fetched = self.algorithms.load_missing(&graph, &remote_heads).await?;
        graph.extend(fetched)?;

        if remote_heads.len() == 1 && remote_heads.contains(&base) {
            // Remote has not moved.
            session.graph = graph;
            return Ok(());
        }

        let plan = self
            .rebase_staged(&mut graph, &base, &tip, &working, &remote_heads)
            .await?;

        session.graph = graph;
        session.base = Some(plan.base);
        session.revision = Some(plan.tip);
        session.level = plan.level;
        session.pending = plan.pending;
        session.working = plan.working;
        for diff in &plan.value_tail {
            session.state.apply(diff);
        }
        Ok(())
    }

    /// Rebase the local chain (pending commits, then working diffs) onto
    /// the given remote heads, staging everything in `graph` and local
    /// buffers. Multiple heads are merged first; the merge commit joins
    /// the staged pending chain since it is locally minted.
    async fn rebase_staged(
        &self,
        graph: &mut CommitGraph<K, D>,
        old_base: &K,
        old_tip: &K,
        working: &[D],
        remote_heads: &BTreeSet<K>,
    ) -> Result<RebasePlan<K, D>, OtError> {
        let mut pending: Vec<Commit<K, D>> = Vec::new();

        let new_base = if remote_heads.len() > 1 {
            let merge = self.algorithms.merge_heads(graph, remote_heads).await?;
            let id = merge.id().clone();
            pending.push(merge);
            id
        } else if let Some(head) = remote_heads.iter().next() {
            head.clone()
        } else {
            return Err(OtError::InvariantViolation(
                "rebase against an empty head set".into(),
            ));
        };

        let system = self.algorithms.system();
        let divergence = path_diffs(graph, old_base, &new_base)?;
        let pending_diffs = path_diffs(graph, old_base, old_tip)?;

        // Pending commits race the divergence first...
        let relocated = system.transform(&pending_diffs, &divergence)?;
        if let Some(winner) = relocated.resolution {
            log::warn!("rebasing pending commits hit a conflict; resolved for the {winner:?} side");
        }
        // ...then the working diffs race what is left of the divergence.
        let carried = system.transform(working, &relocated.right)?;
        if let Some(winner) = carried.resolution {
            log::warn!("rebasing working diffs hit a conflict; resolved for the {winner:?} side");
        }

        let rebased_pending = system.squash(&relocated.left)?;
        let base_level = graph.require(&new_base)?.level();
        let (tip, level) = if rebased_pending.is_empty() {
            (new_base.clone(), base_level)
        } else {
            let commit = self
                .algorithms
                .repository()
                .create_commit(
                    BTreeMap::from([(new_base.clone(), rebased_pending)]),
                    base_level + 1,
                )
                .await?;
            graph.insert(commit.clone())?;
            let id = commit.id().clone();
            pending.push(commit);
            (id, base_level + 1)
        };

        Ok(RebasePlan {
            base: new_base,
            tip,
            level,
            pending,
            working: carried.left,
            value_tail: carried.right,
        })
    }

    // === Session lifecycle ===

    /// Create and push the root commit of an empty repository, then attach
    /// to it.
    pub async fn init_repository(&self) -> Result<K, OtError> {
        let mut session = self.session.lock().await;
        if session.revision.is_some() {
            return Err(OtError::InvalidState("session already attached to a revision"));
        }
        let heads = self.algorithms.repository().heads().await?;
        if !heads.is_empty() {
            return Err(OtError::InvalidState(
                "repository already has a history; checkout a head instead",
            ));
        }
        let root = self
            .algorithms
            .repository()
            .create_commit(BTreeMap::new(), 0)
            .await?;
        match self.algorithms.repository().push(vec![root.clone()]).await? {
            PushOutcome::Ok => {}
            PushOutcome::Rejected { .. } => {
                return Err(OtError::InvalidState(
                    "repository was initialized concurrently; checkout a head instead",
                ))
            }
        }

        session.graph.insert(root.clone())?;
        session.state.init();
        session.working.clear();
        session.pending.clear();
        session.base = Some(root.id().clone());
        session.revision = Some(root.id().clone());
        session.level = 0;
        Ok(root.id().clone())
    }

    /// Attach the session to `revision`, discarding any working diffs.
    ///
    /// Destructive by design: callers decide beforehand that the working
    /// set is disposable. Refused while commits are pending, because those
    /// may already be referenced by id elsewhere; push or discard them
    /// first. The value is rebuilt from the nearest snapshot plus the
    /// remaining diff path.
    pub async fn checkout(&self, revision: K) -> Result<(), OtError> {
        let mut session = self.session.lock().await;
        self.do_checkout(&mut session, revision).await
    }

    /// Fetch the remote heads and checkout the newest one (highest level,
    /// ties by id). Returns the chosen head.
    pub async fn checkout_head(&self) -> Result<K, OtError> {
        let mut session = self.session.lock().await;
        let heads = self.algorithms.repository().heads().await?;

        let mut best: Option<(u64, K)> = None;
        for head in &heads {
            let level = match session.graph.get(head) {
                Some(commit) => commit.level(),
                None => self.algorithms.repository().load_commit(head).await?.level(),
            };
            let candidate = (level, head.clone());
            if best.as_ref().map_or(true, |current| candidate > *current) {
                best = Some(candidate);
            }
        }

        match best {
            Some((_, head)) => {
                self.do_checkout(&mut session, head.clone()).await?;
                Ok(head)
            }
            None => Err(OtError::InvalidState("repository has no heads")),
        }
    }

    async fn do_checkout(
        &self,
        session: &mut Session<K, D, S>,
        revision: K,
    ) -> Result<(), OtError> {
        if !session.pending.is_empty() {
            return Err(OtError::InvalidState(
                "checkout with unpushed commits; push or discard them first",
            ));
        }

        let mut graph = session.graph.clone();
        let fetched = self
            .algorithms
            .load_missing(&graph, &BTreeSet::from([revision.clone()]))
            .await?;
        graph.extend(fetched)?;
        let target_level = graph.require(&revision)?.level();

        // Walk ancestors newest-first until a snapshotted commit is found;
        // fall back to replaying the whole history from the root.
        let mut replay: Option<(K, Vec<D>)> = None;
        let mut frontier: BTreeSet<(u64, K)> = BTreeSet::from([(target_level, revision.clone())]);
        let mut seen: HashSet<K> = HashSet::from([revision.clone()]);
        while let Some((_, id)) = frontier.pop_last() {
            if let Some(diffs) = self.algorithms.repository().load_snapshot(&id).await? {
                replay = Some((id, diffs));
                break;
            }
            for parent in graph.require(&id)?.parent_ids() {
                if seen.insert(parent.clone()) {
                    frontier.insert((graph.require(parent)?.level(), parent.clone()));
                }
            }
        }
        let (snap_base, snap_diffs) = match replay {
            Some(found) => found,
            None => (find_root(&graph, &revision)?, Vec::new()),
        };
        let tail = path_diffs(&graph, &snap_base, &revision)?;

        session.graph = graph;
        session.state.init();
        for diff in &snap_diffs {
            session.state.apply(diff);
        }
        for diff in &tail {
            session.state.apply(diff);
        }
        session.working.clear();
        session.level = target_level;
        session.base = Some(revision.clone());
        session.revision = Some(revision);
        Ok(())
    }

    /// Persist the squashed root-to-revision diff path as a snapshot,
    /// bounding the replay cost of later checkouts.
    pub async fn make_snapshot(&self) -> Result<(), OtError> {
        let session = self.session.lock().await;
        let (_, tip) = session.position()?;
        let root = find_root(&session.graph, &tip)?;
        let path = path_diffs(&session.graph, &root, &tip)?;
        let diffs = self.algorithms.system().squash(&path)?;
        self.algorithms.repository().save_snapshot(tip, diffs).await?;
        Ok(())
    }
}
