//! The diff trait implemented once per domain value type.

use std::fmt::Debug;
use std::hash::Hash;

/// A single atomic edit of a domain value.
///
/// Diffs of one domain form a closed enum; the associated [`Diff::Variant`]
/// tag enumerates its cases and keys the algebra registry. Diffs are plain
/// data: all behavior (transform, squash, invert, emptiness) lives in the
/// registered handlers, so the same engine serves counters, documents and
/// maps without knowing anything about their payloads.
pub trait Diff: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Tag identifying which case of the domain's diff enum this is.
    type Variant: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static;

    fn variant(&self) -> Self::Variant;
}
