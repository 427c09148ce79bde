//! In-process repository used by tests and demos.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::graph::Commit;

use super::{OtRepository, PushOutcome, RepoError};

/// An in-memory [`OtRepository`] shared by any number of sessions.
///
/// Reproduces the push-race semantics of a real commit server: a push is
/// accepted only if it covers every current head, otherwise it is rejected
/// wholesale with the heads the pusher has not seen.
pub struct InMemoryRepository<D> {
    store: Mutex<Store<D>>,
}

struct Store<D> {
    commits: HashMap<Uuid, Commit<Uuid, D>>,
    heads: BTreeSet<Uuid>,
    snapshots: HashMap<Uuid, Vec<D>>,
}

impl<D> InMemoryRepository<D> {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                commits: HashMap::new(),
                heads: BTreeSet::new(),
                snapshots: HashMap::new(),
            }),
        }
    }

    /// Number of commits stored, for test assertions.
    pub async fn commit_count(&self) -> usize {
        self.store.lock().await.commits.len()
    }
}

impl<D> Default for InMemoryRepository<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D> OtRepository<Uuid, D> for InMemoryRepository<D>
where
    D: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    async fn create_commit_id(&self) -> Result<Uuid, RepoError> {
        Ok(Uuid::new_v4())
    }

    async fn push(&self, commits: Vec<Commit<Uuid, D>>) -> Result<PushOutcome<Uuid>, RepoError> {
        let mut store = self.store.lock().await;

        let pushed_ids: BTreeSet<Uuid> = commits.iter().map(|c| *c.id()).collect();
        let mut covered = pushed_ids.clone();
        for commit in &commits {
            for parent in commit.parent_ids() {
                covered.insert(*parent);
                if !store.commits.contains_key(parent) && !pushed_ids.contains(parent) {
                    return Err(RepoError::Storage(format!(
                        "commit {:?} references unknown parent {:?}",
                        commit.id(),
                        parent
                    )));
                }
            }
        }

        // The push must account for every head the server currently has;
        // otherwise the pusher is behind and has to rebase first.
        if !store.heads.iter().all(|h| covered.contains(h)) {
            return Ok(PushOutcome::Rejected {
                current_heads: store.heads.clone(),
            });
        }

        let pushed_parents: BTreeSet<Uuid> = commits
            .iter()
            .flat_map(|c| c.parent_ids().copied())
            .collect();
        for commit in commits {
            store.heads.remove(commit.id());
            store.commits.insert(*commit.id(), commit);
        }
        store.heads.retain(|h| !pushed_parents.contains(h));
        for id in pushed_ids {
            if !pushed_parents.contains(&id) {
                store.heads.insert(id);
            }
        }

        Ok(PushOutcome::Ok)
    }

    async fn heads(&self) -> Result<BTreeSet<Uuid>, RepoError> {
        Ok(self.store.lock().await.heads.clone())
    }

    async fn load_commit(&self, id: &Uuid) -> Result<Commit<Uuid, D>, RepoError> {
        self.store
            .lock()
            .await
            .commits
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("{id}")))
    }

    async fn save_snapshot(&self, id: Uuid, diffs: Vec<D>) -> Result<(), RepoError> {
        self.store.lock().await.snapshots.insert(id, diffs);
        Ok(())
    }

    async fn load_snapshot(&self, id: &Uuid) -> Result<Option<Vec<D>>, RepoError> {
        Ok(self.store.lock().await.snapshots.get(id).cloned())
    }
}
