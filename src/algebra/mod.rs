//! The diff algebra: domain-pluggable transform/squash/invert dispatch.
//!
//! Each domain defines a closed enum of diff variants and registers, per
//! variant pair, how concurrent diffs are reconciled. The registry is an
//! immutable table built once at startup and passed explicitly to every
//! component that needs it.

mod diff;
mod system;
mod transform;

pub use diff::Diff;
pub use system::{AlgebraError, OtSystem, OtSystemBuilder};
pub use transform::{ConflictResolution, TransformOutcome, TransformResult};
