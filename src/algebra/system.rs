//! The algebra registry: per-variant-pair dispatch tables.

use std::collections::HashMap;

use thiserror::Error;

use super::diff::Diff;
use super::transform::{ConflictResolution, TransformOutcome, TransformResult};

/// A registered pairwise transform handler.
pub type TransformFn<D> = Box<dyn Fn(&D, &D) -> TransformOutcome<D> + Send + Sync>;

/// A registered pairwise squash handler. Returning `None` refuses to
/// combine the pair; the squash loop then advances past it.
pub type SquashFn<D> = Box<dyn Fn(&D, &D) -> Option<D> + Send + Sync>;

/// A registered invert handler.
pub type InvertFn<D> = Box<dyn Fn(&D) -> D + Send + Sync>;

/// A registered emptiness predicate.
pub type EmptyFn<D> = Box<dyn Fn(&D) -> bool + Send + Sync>;

/// A variant pair was dispatched with no registered handler.
///
/// This is a configuration defect, not a runtime condition: the registry
/// must be total over all variant pairs that can legally race. Fatal,
/// never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgebraError {
    #[error("no transform registered for variant pair ({left}, {right})")]
    MissingTransform { left: String, right: String },

    #[error("no squash registered for variant {variant} against itself")]
    MissingSquash { variant: String },

    #[error("no invert registered for variant {variant}")]
    MissingInvert { variant: String },
}

/// Immutable dispatch table for one domain's diff algebra.
///
/// Built once via [`OtSystemBuilder`] and shared (typically behind an
/// `Arc`) by every component that transforms, squashes or inverts diffs.
/// There is no ambient registry: the system is an explicit value.
pub struct OtSystem<D: Diff> {
    transforms: HashMap<(D::Variant, D::Variant), TransformFn<D>>,
    squashes: HashMap<(D::Variant, D::Variant), SquashFn<D>>,
    inverts: HashMap<D::Variant, InvertFn<D>>,
    empties: HashMap<D::Variant, EmptyFn<D>>,
}

/// Builder populating an [`OtSystem`]'s dispatch tables at startup.
pub struct OtSystemBuilder<D: Diff> {
    system: OtSystem<D>,
}

impl<D: Diff> OtSystemBuilder<D> {
    pub fn new() -> Self {
        Self {
            system: OtSystem {
                transforms: HashMap::new(),
                squashes: HashMap::new(),
                inverts: HashMap::new(),
                empties: HashMap::new(),
            },
        }
    }

    /// Register a transform handler for the ordered pair `(left, right)`.
    ///
    /// The registration is symmetric: querying the mirrored pair
    /// `(right, left)` reuses the same handler with inputs and outputs
    /// swapped (including the conflict side), so each unordered pair is
    /// registered exactly once.
    pub fn transform<F>(mut self, left: D::Variant, right: D::Variant, f: F) -> Self
    where
        F: Fn(&D, &D) -> TransformOutcome<D> + Send + Sync + 'static,
    {
        self.system.transforms.insert((left, right), Box::new(f));
        self
    }

    /// Register a squash handler for adjacent diffs of variants
    /// `(first, second)`, in application order.
    pub fn squash<F>(mut self, first: D::Variant, second: D::Variant, f: F) -> Self
    where
        F: Fn(&D, &D) -> Option<D> + Send + Sync + 'static,
    {
        self.system.squashes.insert((first, second), Box::new(f));
        self
    }

    /// Register the inverse constructor for a variant.
    pub fn invert<F>(mut self, variant: D::Variant, f: F) -> Self
    where
        F: Fn(&D) -> D + Send + Sync + 'static,
    {
        self.system.inverts.insert(variant, Box::new(f));
        self
    }

    /// Register the emptiness predicate for a variant. Variants without a
    /// predicate are treated as never empty.
    pub fn empty_if<F>(mut self, variant: D::Variant, f: F) -> Self
    where
        F: Fn(&D) -> bool + Send + Sync + 'static,
    {
        self.system.empties.insert(variant, Box::new(f));
        self
    }

    pub fn build(self) -> OtSystem<D> {
        self.system
    }
}

impl<D: Diff> Default for OtSystemBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal outcome of the list-vs-list reduction: either both complements,
/// or a conflict that escalates to the whole call.
enum ListOutcome<D> {
    Done(Vec<D>, Vec<D>),
    Conflict(ConflictResolution),
}

impl<D: Diff> OtSystem<D> {
    pub fn builder() -> OtSystemBuilder<D> {
        OtSystemBuilder::new()
    }

    /// Transform two concurrent diff sequences rooted at the same base.
    ///
    /// Works by iterative pairwise reduction: transform the first diff of
    /// each side, substitute the outputs back into the two sequences,
    /// repeat until one side is exhausted. A conflict at any pairwise step
    /// escalates to the whole call: the losing side's entire sequence is
    /// undone and replaced by the winner's, never partially applied.
    pub fn transform(&self, left: &[D], right: &[D]) -> Result<TransformResult<D>, AlgebraError> {
        let left_in: Vec<D> = left.iter().filter(|d| !self.diff_is_empty(d)).cloned().collect();
        let right_in: Vec<D> = right.iter().filter(|d| !self.diff_is_empty(d)).cloned().collect();

        match self.transform_lists(&left_in, &right_in)? {
            ListOutcome::Done(l, r) => Ok(TransformResult {
                left: l,
                right: r,
                resolution: None,
            }),
            ListOutcome::Conflict(winner) => {
                log::debug!("transform conflict, resolving in favor of the {winner:?} side");
                let (l, r) = match winner {
                    // The losing replica undoes everything it did and
                    // applies the winning sequence instead.
                    ConflictResolution::Left => {
                        let mut undo = self.invert(&right_in)?;
                        undo.extend(left_in);
                        (self.squash(&undo)?, Vec::new())
                    }
                    ConflictResolution::Right => {
                        let mut undo = self.invert(&left_in)?;
                        undo.extend(right_in);
                        (Vec::new(), self.squash(&undo)?)
                    }
                };
                Ok(TransformResult {
                    left: l,
                    right: r,
                    resolution: Some(winner),
                })
            }
        }
    }

    fn transform_lists(&self, left: &[D], right: &[D]) -> Result<ListOutcome<D>, AlgebraError> {
        // Handler outputs substituted back into the sequences may contain
        // empty diffs; each reduction step works on the non-empty rest.
        let left: Vec<D> = left.iter().filter(|d| !self.diff_is_empty(d)).cloned().collect();
        let right: Vec<D> = right.iter().filter(|d| !self.diff_is_empty(d)).cloned().collect();
        if left.is_empty() {
            return Ok(ListOutcome::Done(Vec::new(), right));
        }
        if right.is_empty() {
            return Ok(ListOutcome::Done(left, Vec::new()));
        }

        // Transform the two head diffs against each other.
        let (head_left, head_right) = match self.transform_pair(&left[0], &right[0])? {
            TransformOutcome::Transformed { left, right } => (left, right),
            TransformOutcome::Conflict(winner) => return Ok(ListOutcome::Conflict(winner)),
        };

        // The rest of the left sequence races the transformed right head.
        let (left_tail, right_head) = match self.transform_lists(&left[1..], &head_right)? {
            ListOutcome::Done(l, r) => (l, r),
            ListOutcome::Conflict(winner) => return Ok(ListOutcome::Conflict(winner)),
        };

        // The rest of the right sequence races the fully transformed left
        // side (head complement plus transformed tail).
        let mut merged_left = head_left;
        merged_left.extend(left_tail);
        let (right_tail, left_out) = match self.transform_lists(&right[1..], &merged_left)? {
            ListOutcome::Done(l, r) => (l, r),
            ListOutcome::Conflict(winner) => return Ok(ListOutcome::Conflict(winner)),
        };

        let mut right_out = right_head;
        right_out.extend(right_tail);
        Ok(ListOutcome::Done(left_out, right_out))
    }

    /// Dispatch a single diff pair, swapping through the mirrored
    /// registration when only `(right, left)` was registered.
    fn transform_pair(&self, left: &D, right: &D) -> Result<TransformOutcome<D>, AlgebraError> {
        let key = (left.variant(), right.variant());
        if let Some(f) = self.transforms.get(&key) {
            return Ok(f(left, right));
        }
        if let Some(f) = self.transforms.get(&(key.1, key.0)) {
            return Ok(match f(right, left) {
                TransformOutcome::Transformed { left, right } => TransformOutcome::Transformed {
                    left: right,
                    right: left,
                },
                TransformOutcome::Conflict(winner) => TransformOutcome::Conflict(winner.opposite()),
            });
        }
        Err(AlgebraError::MissingTransform {
            left: format!("{:?}", key.0),
            right: format!("{:?}", key.1),
        })
    }

    /// Compact a diff sequence without changing its net effect.
    ///
    /// Empty diffs are dropped; adjacent pairs are squashed where their
    /// registered handler accepts, retrying from the new neighbor after
    /// each success and advancing past refusals. Order is preserved and
    /// the output is never longer than the input.
    pub fn squash(&self, diffs: &[D]) -> Result<Vec<D>, AlgebraError> {
        let mut out: Vec<D> = Vec::with_capacity(diffs.len());
        for diff in diffs {
            if self.diff_is_empty(diff) {
                continue;
            }
            out.push(diff.clone());
            // Cascade: a successful squash may enable squashing with the
            // diff before it.
            while out.len() >= 2 {
                let second = &out[out.len() - 1];
                let first = &out[out.len() - 2];
                match self.squash_pair(first, second)? {
                    Some(merged) => {
                        out.truncate(out.len() - 2);
                        if !self.diff_is_empty(&merged) {
                            out.push(merged);
                        }
                    }
                    None => break,
                }
            }
        }
        Ok(out)
    }

    fn squash_pair(&self, first: &D, second: &D) -> Result<Option<D>, AlgebraError> {
        let key = (first.variant(), second.variant());
        match self.squashes.get(&key) {
            Some(f) => Ok(f(first, second)),
            // Every variant must at least decide squashing against itself;
            // cross-variant pairs may simply be left unregistered.
            None if key.0 == key.1 => Err(AlgebraError::MissingSquash {
                variant: format!("{:?}", key.0),
            }),
            None => Ok(None),
        }
    }

    /// Produce the sequence undoing `diffs`: reverse order, each inverted.
    pub fn invert(&self, diffs: &[D]) -> Result<Vec<D>, AlgebraError> {
        let mut out = Vec::with_capacity(diffs.len());
        for diff in diffs.iter().rev() {
            let f = self
                .inverts
                .get(&diff.variant())
                .ok_or_else(|| AlgebraError::MissingInvert {
                    variant: format!("{:?}", diff.variant()),
                })?;
            out.push(f(diff));
        }
        Ok(out)
    }

    /// True iff every diff in the sequence is a no-op.
    pub fn is_empty(&self, diffs: &[D]) -> bool {
        diffs.iter().all(|d| self.diff_is_empty(d))
    }

    /// True iff a single diff is a no-op per its registered predicate.
    pub fn diff_is_empty(&self, diff: &D) -> bool {
        self.empties.get(&diff.variant()).is_some_and(|f| f(diff))
    }
}
