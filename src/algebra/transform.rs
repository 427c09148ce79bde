//! Transform outputs: complements of concurrent diff sequences.

/// Which side a deterministic conflict resolution favored.
///
/// Handlers must compute this as a pure function of the two diffs so that
/// every replica resolves the same race identically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictResolution {
    Left,
    Right,
}

impl ConflictResolution {
    pub fn opposite(self) -> Self {
        match self {
            ConflictResolution::Left => ConflictResolution::Right,
            ConflictResolution::Right => ConflictResolution::Left,
        }
    }
}

/// Output of a single registered pairwise transform handler.
#[derive(Clone, Debug)]
pub enum TransformOutcome<D> {
    /// Both complements were computed: `left` is the left diff re-expressed
    /// to apply after the right diff, `right` the converse.
    Transformed { left: Vec<D>, right: Vec<D> },

    /// The pair cannot be reconciled; the named side's diffs win outright.
    Conflict(ConflictResolution),
}

impl<D> TransformOutcome<D> {
    /// Both complements, each a (possibly empty) diff list.
    pub fn transformed(left: Vec<D>, right: Vec<D>) -> Self {
        TransformOutcome::Transformed { left, right }
    }

    /// Irreconcilable pair; `winner`'s diffs are kept, the other side's
    /// are undone.
    pub fn conflict(winner: ConflictResolution) -> Self {
        TransformOutcome::Conflict(winner)
    }
}

/// Result of transforming two concurrent diff sequences against each other.
///
/// `left` holds the left-side diffs re-expressed to apply after the right
/// side: a replica that has already applied the right-side diffs applies
/// `left` to converge, and vice versa. When any pairwise step conflicted,
/// `resolution` records which side won; the whole call is then resolved at
/// once (the losing side undoes all its diffs), never partially.
#[derive(Clone, Debug)]
pub struct TransformResult<D> {
    pub left: Vec<D>,
    pub right: Vec<D>,
    pub resolution: Option<ConflictResolution>,
}

impl<D> TransformResult<D> {
    pub fn had_conflict(&self) -> bool {
        self.resolution.is_some()
    }
}
