//! Reference diff domains shared by the integration tests.
//!
//! Three domains exercise every registry feature: a counter (symmetric
//! handler reuse plus a genuine conflict pair), positional text editing
//! (list-valued transform outputs), and a last-writer-wins map
//! (commuting cross-key edits).

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use conflux::{
    ConflictResolution, Diff, InMemoryRepository, OtAlgorithms, OtState, OtSystem, TransformOutcome,
};

// === Counter: add deltas, set absolute values ===

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterDiff {
    Add(i64),
    Set { prev: i64, next: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CounterVariant {
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

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterState(pub i64);

impl OtState<CounterDiff> for CounterState {
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

pub fn counter_system() -> OtSystem<CounterDiff> {
    use CounterDiff::{Add, Set};
    use CounterVariant as V;

    OtSystem::builder()
        .transform(V::Add, V::Add, |l, r| match (l, r) {
            (Add(a), Add(b)) => TransformOutcome::transformed(vec![Add(*a)], vec![Add(*b)]),
            _ => unreachable!(),
        })
        .transform(V::Add, V::Set, |l, r| match (l, r) {
            // A concurrent set wins over an addition: the addition is
            // absorbed into the set's baseline and contributes nothing.
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
            // Two concurrent sets are irreconcilable; the larger target
            // wins, identically on every replica.
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
        .squash(V::Add, V::Set, |l, r| match (l, r) {
            (Add(a), Set { prev, next }) => Some(Set {
                prev: prev - a,
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

// === Text: positional insert/delete over a string ===

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextDiff {
    /// Insert `text` at byte offset `pos`.
    Insert { pos: usize, text: String },
    /// Delete `text` starting at byte offset `pos`. Carrying the deleted
    /// text keeps the diff invertible.
    Delete { pos: usize, text: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextVariant {
    Insert,
    Delete,
}

impl Diff for TextDiff {
    type Variant = TextVariant;

    fn variant(&self) -> TextVariant {
        match self {
            TextDiff::Insert { .. } => TextVariant::Insert,
            TextDiff::Delete { .. } => TextVariant::Delete,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextState(pub String);

impl OtState<TextDiff> for TextState {
    fn init(&mut self) {
        self.0.clear();
    }

    fn apply(&mut self, diff: &TextDiff) {
        match diff {
            TextDiff::Insert { pos, text } => self.0.insert_str(*pos, text),
            TextDiff::Delete { pos, text } => {
                self.0.replace_range(*pos..*pos + text.len(), "");
            }
        }
    }
}

fn insert(pos: usize, text: &str) -> TextDiff {
    TextDiff::Insert {
        pos,
        text: text.to_string(),
    }
}

fn delete(pos: usize, text: &str) -> TextDiff {
    TextDiff::Delete {
        pos,
        text: text.to_string(),
    }
}

fn transform_insert_insert(l: &TextDiff, r: &TextDiff) -> TransformOutcome<TextDiff> {
    let (TextDiff::Insert { pos: p1, text: s1 }, TextDiff::Insert { pos: p2, text: s2 }) = (l, r)
    else {
        unreachable!()
    };
    // Equal positions break the tie by text, identically everywhere.
    if (p1, s1) <= (p2, s2) {
        TransformOutcome::transformed(vec![l.clone()], vec![insert(p2 + s1.len(), s2)])
    } else {
        TransformOutcome::transformed(vec![insert(p1 + s2.len(), s1)], vec![r.clone()])
    }
}

fn transform_insert_delete(l: &TextDiff, r: &TextDiff) -> TransformOutcome<TextDiff> {
    let (TextDiff::Insert { pos: pi, text: s }, TextDiff::Delete { pos: pd, text: t }) = (l, r)
    else {
        unreachable!()
    };
    let (pi, pd) = (*pi, *pd);
    if pi <= pd {
        TransformOutcome::transformed(vec![l.clone()], vec![delete(pd + s.len(), t)])
    } else if pi >= pd + t.len() {
        TransformOutcome::transformed(vec![insert(pi - t.len(), s)], vec![r.clone()])
    } else {
        // The insertion point is inside the deleted range: the insert
        // collapses to the range start, and the delete splits around the
        // inserted text.
        let split = pi - pd;
        TransformOutcome::transformed(
            vec![insert(pd, s)],
            vec![delete(pd, &t[..split]), delete(pd + s.len(), &t[split..])],
        )
    }
}

fn transform_delete_delete(l: &TextDiff, r: &TextDiff) -> TransformOutcome<TextDiff> {
    let (TextDiff::Delete { pos: p1, text: t1 }, TextDiff::Delete { pos: p2, text: t2 }) = (l, r)
    else {
        unreachable!()
    };
    let (p1, p2) = (*p1, *p2);
    let (e1, e2) = (p1 + t1.len(), p2 + t2.len());
    if e1 <= p2 {
        return TransformOutcome::transformed(vec![l.clone()], vec![delete(p2 - t1.len(), t2)]);
    }
    if e2 <= p1 {
        return TransformOutcome::transformed(vec![delete(p1 - t2.len(), t1)], vec![r.clone()]);
    }
    // Overlapping ranges: each side deletes only what the other left.
    let (ol, oe) = (p1.max(p2), e1.min(e2));
    let l_rest = format!("{}{}", &t1[..ol - p1], &t1[oe - p1..]);
    let r_rest = format!("{}{}", &t2[..ol - p2], &t2[oe - p2..]);
    let pos = p1.min(p2);
    let left = if l_rest.is_empty() {
        vec![]
    } else {
        vec![delete(pos, &l_rest)]
    };
    let right = if r_rest.is_empty() {
        vec![]
    } else {
        vec![delete(pos, &r_rest)]
    };
    TransformOutcome::transformed(left, right)
}

pub fn text_system() -> OtSystem<TextDiff> {
    use TextVariant as V;

    OtSystem::builder()
        .transform(V::Insert, V::Insert, transform_insert_insert)
        .transform(V::Insert, V::Delete, transform_insert_delete)
        .transform(V::Delete, V::Delete, transform_delete_delete)
        .squash(V::Insert, V::Insert, |a, b| {
            let (
                TextDiff::Insert { pos: p1, text: s1 },
                TextDiff::Insert { pos: p2, text: s2 },
            ) = (a, b)
            else {
                unreachable!()
            };
            // The second insert must land inside the span the first one
            // produced, otherwise they are unrelated.
            if *p2 >= *p1 && *p2 <= p1 + s1.len() {
                let split = p2 - p1;
                Some(insert(
                    *p1,
                    &format!("{}{}{}", &s1[..split], s2, &s1[split..]),
                ))
            } else {
                None
            }
        })
        .squash(V::Delete, V::Delete, |a, b| {
            let (
                TextDiff::Delete { pos: p1, text: t1 },
                TextDiff::Delete { pos: p2, text: t2 },
            ) = (a, b)
            else {
                unreachable!()
            };
            if *p2 == *p1 {
                Some(delete(*p1, &format!("{t1}{t2}")))
            } else if p2 + t2.len() == *p1 {
                Some(delete(*p2, &format!("{t2}{t1}")))
            } else {
                None
            }
        })
        .invert(V::Insert, |d| {
            let TextDiff::Insert { pos, text } = d else {
                unreachable!()
            };
            delete(*pos, text)
        })
        .invert(V::Delete, |d| {
            let TextDiff::Delete { pos, text } = d else {
                unreachable!()
            };
            insert(*pos, text)
        })
        .empty_if(V::Insert, |d| matches!(d, TextDiff::Insert { text, .. } if text.is_empty()))
        .empty_if(V::Delete, |d| matches!(d, TextDiff::Delete { text, .. } if text.is_empty()))
        .build()
}

pub fn text_insert(pos: usize, text: &str) -> TextDiff {
    insert(pos, text)
}

pub fn text_delete(pos: usize, text: &str) -> TextDiff {
    delete(pos, text)
}

// === Last-writer-wins map ===

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapDiff {
    Put {
        key: String,
        prev: Option<String>,
        next: Option<String>,
        /// Logical timestamp deciding concurrent writes to the same key.
        ts: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapVariant {
    Put,
}

impl Diff for MapDiff {
    type Variant = MapVariant;

    fn variant(&self) -> MapVariant {
        MapVariant::Put
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapState(pub BTreeMap<String, String>);

impl OtState<MapDiff> for MapState {
    fn init(&mut self) {
        self.0.clear();
    }

    fn apply(&mut self, diff: &MapDiff) {
        let MapDiff::Put { key, next, .. } = diff;
        match next {
            Some(value) => self.0.insert(key.clone(), value.clone()),
            None => self.0.remove(key),
        };
    }
}

pub fn put(key: &str, prev: Option<&str>, next: Option<&str>, ts: u64) -> MapDiff {
    MapDiff::Put {
        key: key.to_string(),
        prev: prev.map(str::to_string),
        next: next.map(str::to_string),
        ts,
    }
}

pub fn map_system() -> OtSystem<MapDiff> {
    use MapVariant as V;

    OtSystem::builder()
        .transform(V::Put, V::Put, |l, r| {
            let MapDiff::Put {
                key: lk,
                next: ln,
                ts: lt,
                ..
            } = l;
            let MapDiff::Put {
                key: rk,
                next: rn,
                ts: rt,
                ..
            } = r;
            if lk != rk {
                // Different keys commute untouched.
                return TransformOutcome::transformed(vec![l.clone()], vec![r.clone()]);
            }
            // Same key: the later write wins, ties broken by value.
            if (lt, ln) >= (rt, rn) {
                TransformOutcome::transformed(
                    vec![MapDiff::Put {
                        key: lk.clone(),
                        prev: rn.clone(),
                        next: ln.clone(),
                        ts: *lt,
                    }],
                    vec![],
                )
            } else {
                TransformOutcome::transformed(
                    vec![],
                    vec![MapDiff::Put {
                        key: rk.clone(),
                        prev: ln.clone(),
                        next: rn.clone(),
                        ts: *rt,
                    }],
                )
            }
        })
        .squash(V::Put, V::Put, |a, b| {
            let MapDiff::Put {
                key: ak,
                prev: ap,
                ts: at,
                ..
            } = a;
            let MapDiff::Put {
                key: bk,
                next: bn,
                ts: bt,
                ..
            } = b;
            if ak == bk {
                Some(MapDiff::Put {
                    key: ak.clone(),
                    prev: ap.clone(),
                    next: bn.clone(),
                    ts: *at.max(bt),
                })
            } else {
                None
            }
        })
        .invert(V::Put, |d| {
            let MapDiff::Put {
                key,
                prev,
                next,
                ts,
            } = d;
            MapDiff::Put {
                key: key.clone(),
                prev: next.clone(),
                next: prev.clone(),
                ts: *ts,
            }
        })
        .empty_if(V::Put, |d| {
            let MapDiff::Put { prev, next, .. } = d;
            prev == next
        })
        .build()
}

// === Wiring helpers ===

pub type CounterManager =
    conflux::OtStateManager<Uuid, CounterDiff, CounterState, InMemoryRepository<CounterDiff>>;

pub type TextManager =
    conflux::OtStateManager<Uuid, TextDiff, TextState, InMemoryRepository<TextDiff>>;

pub fn counter_manager(repository: &Arc<InMemoryRepository<CounterDiff>>) -> CounterManager {
    let algorithms = Arc::new(OtAlgorithms::new(
        Arc::new(counter_system()),
        Arc::clone(repository),
    ));
    conflux::OtStateManager::new(algorithms, CounterState::default())
}

pub fn text_manager(repository: &Arc<InMemoryRepository<TextDiff>>) -> TextManager {
    let algorithms = Arc::new(OtAlgorithms::new(
        Arc::new(text_system()),
        Arc::clone(repository),
    ));
    conflux::OtStateManager::new(algorithms, TextState::default())
}

/// Fold diffs through a fresh builder-independent state, for property
/// checks that compare application orders.
pub fn apply_counter(base: i64, diffs: &[CounterDiff]) -> i64 {
    let mut state = CounterState(base);
    for diff in diffs {
        state.apply(diff);
    }
    state.0
}

pub fn apply_text(base: &str, diffs: &[TextDiff]) -> String {
    let mut state = TextState(base.to_string());
    for diff in diffs {
        state.apply(diff);
    }
    state.0
}

pub fn apply_map(base: &BTreeMap<String, String>, diffs: &[MapDiff]) -> BTreeMap<String, String> {
    let mut state = MapState(base.clone());
    for diff in diffs {
        state.apply(diff);
    }
    state.0
}
