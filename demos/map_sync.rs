//! Offline-capable settings synchronization over a last-writer-wins map.
//!
//! Two devices edit disjoint and overlapping keys while disconnected,
//! then exchange commits; overlapping writes resolve by logical
//! timestamp, identically on both sides.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use conflux::{
    Diff, InMemoryRepository, OtAlgorithms, OtState, OtStateManager, OtSystem, TransformOutcome,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum MapDiff {
    Put {
        key: String,
        prev: Option<String>,
        next: Option<String>,
        ts: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum MapVariant {
    Put,
}

impl Diff for MapDiff {
    type Variant = MapVariant;

    fn variant(&self) -> MapVariant {
        MapVariant::Put
    }
}

#[derive(Default)]
struct Settings(BTreeMap<String, String>);

impl OtState<MapDiff> for Settings {
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

fn map_system() -> OtSystem<MapDiff> {
    use MapVariant as V;

    OtSystem::builder()
        .transform(V::Put, V::Put, |l, r| {
            let MapDiff::Put { key: lk, next: ln, ts: lt, .. } = l;
            let MapDiff::Put { key: rk, next: rn, ts: rt, .. } = r;
            if lk != rk {
                return TransformOutcome::transformed(vec![l.clone()], vec![r.clone()]);
            }
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
            let MapDiff::Put { key: ak, prev: ap, ts: at, .. } = a;
            let MapDiff::Put { key: bk, next: bn, ts: bt, .. } = b;
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
            let MapDiff::Put { key, prev, next, ts } = d;
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

fn set(key: &str, prev: Option<&str>, next: &str, ts: u64) -> MapDiff {
    MapDiff::Put {
        key: key.to_string(),
        prev: prev.map(str::to_string),
        next: Some(next.to_string()),
        ts,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let repository = Arc::new(InMemoryRepository::new());
    let system = Arc::new(map_system());

    let phone = OtStateManager::new(
        Arc::new(OtAlgorithms::new(Arc::clone(&system), Arc::clone(&repository))),
        Settings::default(),
    );
    let laptop = OtStateManager::new(
        Arc::new(OtAlgorithms::new(Arc::clone(&system), Arc::clone(&repository))),
        Settings::default(),
    );

    phone.init_repository().await?;
    laptop.checkout_head().await?;

    // Disconnected edits on both devices.
    phone.add(set("theme", None, "dark", 1)).await?;
    phone.add(set("volume", None, "30", 2)).await?;
    laptop.add(set("theme", None, "light", 3)).await?;
    laptop.add(set("font", None, "mono", 4)).await?;

    phone.commit().await?;
    phone.push().await?;

    laptop.commit().await?;
    laptop.push().await?;
    phone.pull().await?;

    let phone_view = phone.with_state(|s| s.0.clone()).await;
    let laptop_view = laptop.with_state(|s| s.0.clone()).await;
    assert_eq!(phone_view, laptop_view);
    for (key, value) in &phone_view {
        println!("{key} = {value}");
    }
    Ok(())
}
