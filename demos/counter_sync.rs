//! Two clients concurrently edit a shared counter and converge.
//!
//! Client A adds a delta while client B overwrites the value; the
//! registered algebra lets the overwrite win and both replicas settle on
//! the same number without coordinating up front.

use std::sync::Arc;

use anyhow::Result;

use conflux::{
    ConflictResolution, Diff, InMemoryRepository, OtAlgorithms, OtState, OtStateManager, OtSystem,
    TransformOutcome,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CounterDiff {
    Add(i64),
    Set { prev: i64, next: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum CounterVariant {
    Add,
    Set,
}

impl Diff for CounterDiff {
    type Variant = CounterVariant;

    fn variant(&self) -> CounterVariant {
        match self {
            CounterDiff::Add(_) => CounterVariant::Add,
            CounterDiff::Set { .. } => CounterVariant::Set,
        }
    }
}

#[derive(Default)]
struct Counter(i64);

impl OtState<CounterDiff> for Counter {
    fn init(&mut self) {
        self.0 = 0;
    }

    fn apply(&mut self, diff: &CounterDiff) {
        match diff {
            CounterDiff::Add(n) => self.0 += n,
            CounterDiff::Set { next, .. } => self.0 = *next,
        }
    }
}

fn counter_system() -> OtSystem<CounterDiff> {
    use CounterDiff::{Add, Set};
    use CounterVariant as V;

    OtSystem::builder()
        .transform(V::Add, V::Add, |l, r| match (l, r) {
            (Add(a), Add(b)) => TransformOutcome::transformed(vec![Add(*a)], vec![Add(*b)]),
            _ => unreachable!(),
        })
        .transform(V::Add, V::Set, |l, r| match (l, r) {
            (Add(a), Set { prev, next }) => TransformOutcome::transformed(
                vec![],
                vec![Set {
                    prev: prev + a,
                    next: *next,
                }],
            ),
            _ => unreachable!(),
        })
        .transform(V::Set, V::Set, |l, r| match (l, r) {
            (Set { next: a, .. }, Set { next: b, .. }) => TransformOutcome::conflict(if a >= b {
                ConflictResolution::Left
            } else {
                ConflictResolution::Right
            }),
            _ => unreachable!(),
        })
        .squash(V::Add, V::Add, |l, r| match (l, r) {
            (Add(a), Add(b)) => Some(Add(a + b)),
            _ => unreachable!(),
        })
        .squash(V::Set, V::Set, |l, r| match (l, r) {
            (Set { prev, .. }, Set { next, .. }) => Some(Set {
                prev: *prev,
                next: *next,
            }),
            _ => unreachable!(),
        })
        .invert(V::Add, |d| match d {
            Add(n) => Add(-n),
            _ => unreachable!(),
        })
        .invert(V::Set, |d| match d {
            Set { prev, next } => Set {
                prev: *next,
                next: *prev,
            },
            _ => unreachable!(),
        })
        .empty_if(V::Add, |d| matches!(d, Add(0)))
        .empty_if(V::Set, |d| matches!(d, Set { prev, next } if prev == next))
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let repository = Arc::new(InMemoryRepository::new());
    let system = Arc::new(counter_system());

    let a = OtStateManager::new(
        Arc::new(OtAlgorithms::new(Arc::clone(&system), Arc::clone(&repository))),
        Counter::default(),
    );
    let b = OtStateManager::new(
        Arc::new(OtAlgorithms::new(Arc::clone(&system), Arc::clone(&repository))),
        Counter::default(),
    );

    a.init_repository().await?;
    b.checkout_head().await?;

    // Concurrent edits: A adds, B overwrites.
    a.add(CounterDiff::Add(5)).await?;
    b.add(CounterDiff::Set { prev: 0, next: 10 }).await?;
    println!("A sees {}, B sees {}", a.with_state(|s| s.0).await, b.with_state(|s| s.0).await);

    a.commit().await?;
    a.push().await?;

    // B's push races A's and is rebased automatically.
    b.commit().await?;
    b.push().await?;
    a.pull().await?;

    println!(
        "converged: A = {}, B = {}",
        a.with_state(|s| s.0).await,
        b.with_state(|s| s.0).await
    );
    Ok(())
}
