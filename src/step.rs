//! The step trace every mutation produces.
//!
//! Each `insert`/`delete` call returns a [`StepLog`]: an ordered list of [`OperationStep`]s, each
//! describing one atomic transition and carrying a snapshot of the whole tree at that instant. The
//! first step always highlights the requested value and the last step is always
//! [`StepKind::Complete`], holding the tree as it stands after the call.
//!
//! Consecutive steps with no mutation between them share one snapshot, so a long descent costs a
//! single copy of the tree rather than one per comparison.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use serde::Serialize;

use crate::Key;

/// Kind of transition a step records.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    /// A comparison or decision, or a key overwritten in place by another; no node is added,
    /// removed or relinked.
    Highlight,
    /// A new node is about to be materialized for `creating_value`.
    Create,
    /// A key was placed into the tree.
    Insert,
    /// A key is being removed or the tree became empty.
    Delete,
    /// A binary rotation, or a multiway borrow that rotates a key through the parent.
    Rotate,
    /// An overflowing node, or the result of splitting it.
    Split,
    /// Two siblings were merged.
    Merge,
    /// The call finished; the snapshot is the final tree.
    Complete,
}

/// One recorded transition.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStep<S> {
    kind: StepKind,
    description: String,
    highlighted_keys: BTreeSet<Key>,
    overflow_keys: BTreeSet<Key>,
    creating_value: Option<Key>,
    tree: Option<Arc<S>>,
}

/// The steps of a single `insert` or `delete` call, in the order they happened.
pub type StepLog<S> = Vec<OperationStep<S>>;

impl<S> OperationStep<S> {
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Keys a renderer should emphasize.
    pub fn highlighted_keys(&self) -> &BTreeSet<Key> {
        &self.highlighted_keys
    }

    /// Keys of a node that exceeds its capacity at this instant.
    pub fn overflow_keys(&self) -> &BTreeSet<Key> {
        &self.overflow_keys
    }

    /// The value of a node announced by a [`StepKind::Create`] step.
    pub fn creating_value(&self) -> Option<Key> {
        self.creating_value
    }

    /// Snapshot of the tree when the step was recorded; `None` for an empty tree.
    pub fn tree(&self) -> Option<&S> {
        self.tree.as_deref()
    }

    /// Converts the snapshot type, keeping everything else.
    ///
    /// A snapshot still shared with other steps is cloned before conversion.
    pub fn map_tree<T>(self, f: impl FnOnce(S) -> T) -> OperationStep<T>
    where
        S: Clone,
    {
        self.map_shared(|tree| Arc::new(f(Arc::unwrap_or_clone(tree))))
    }

    /// Converts the shared snapshot handle, letting the caller preserve sharing across steps.
    pub(crate) fn map_shared<T>(self, f: impl FnOnce(Arc<S>) -> Arc<T>) -> OperationStep<T> {
        OperationStep {
            kind: self.kind,
            description: self.description,
            highlighted_keys: self.highlighted_keys,
            overflow_keys: self.overflow_keys,
            creating_value: self.creating_value,
            tree: self.tree.map(f),
        }
    }
}

/// A step that has been described but not yet attached to a snapshot.
pub(crate) struct StepDraft {
    kind: StepKind,
    description: String,
    highlighted_keys: BTreeSet<Key>,
    overflow_keys: BTreeSet<Key>,
    creating_value: Option<Key>,
}

impl StepDraft {
    pub(crate) fn new(kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            highlighted_keys: BTreeSet::new(),
            overflow_keys: BTreeSet::new(),
            creating_value: None,
        }
    }

    pub(crate) fn highlight(description: impl Into<String>) -> Self {
        Self::new(StepKind::Highlight, description)
    }

    pub(crate) fn create(description: impl Into<String>, value: Key) -> Self {
        let mut draft = Self::new(StepKind::Create, description);
        draft.creating_value = Some(value);
        draft
    }

    pub(crate) fn insert(description: impl Into<String>) -> Self {
        Self::new(StepKind::Insert, description)
    }

    pub(crate) fn delete(description: impl Into<String>) -> Self {
        Self::new(StepKind::Delete, description)
    }

    pub(crate) fn rotate(description: impl Into<String>) -> Self {
        Self::new(StepKind::Rotate, description)
    }

    pub(crate) fn split(description: impl Into<String>) -> Self {
        Self::new(StepKind::Split, description)
    }

    pub(crate) fn merge(description: impl Into<String>) -> Self {
        Self::new(StepKind::Merge, description)
    }

    pub(crate) fn complete(description: impl Into<String>) -> Self {
        Self::new(StepKind::Complete, description)
    }

    #[must_use]
    pub(crate) fn keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.highlighted_keys.extend(keys);
        self
    }

    #[must_use]
    pub(crate) fn overflow(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.overflow_keys.extend(keys);
        self
    }

    /// Folds an unrecorded earlier draft into this one, keeping this draft's kind.
    #[must_use]
    pub(crate) fn after(mut self, earlier: StepDraft) -> Self {
        self.description = format!("{}; {}", earlier.description, self.description);
        self.highlighted_keys.extend(earlier.highlighted_keys);
        self.overflow_keys.extend(earlier.overflow_keys);
        self
    }

    pub(crate) fn kind(&self) -> StepKind {
        self.kind
    }
}

/// Append-only log owned by an engine for the duration of one call.
///
/// The engine passes the revision of its tree with every step; the last snapshot is reused for as
/// long as the revision stays the same.
pub(crate) struct StepRecorder<S> {
    steps: Vec<OperationStep<S>>,
    cached: Option<(u64, Option<Arc<S>>)>,
}

impl<S> StepRecorder<S> {
    pub(crate) const fn new() -> Self {
        Self {
            steps: Vec::new(),
            cached: None,
        }
    }

    /// Discards anything left from a previous call.
    pub(crate) fn begin(&mut self) {
        self.steps.clear();
    }

    /// Appends `draft`, calling `snapshot` only if the tree changed since the previous step.
    pub(crate) fn record(&mut self, draft: StepDraft, revision: u64, snapshot: impl FnOnce() -> Option<S>) {
        let tree = match &self.cached {
            Some((seen, tree)) if *seen == revision => tree.clone(),
            _ => {
                let tree = snapshot().map(Arc::new);
                self.cached = Some((revision, tree.clone()));
                tree
            }
        };
        self.steps.push(OperationStep {
            kind: draft.kind,
            description: draft.description,
            highlighted_keys: draft.highlighted_keys,
            overflow_keys: draft.overflow_keys,
            creating_value: draft.creating_value,
            tree,
        });
    }

    /// Hands the finished log to the caller.
    pub(crate) fn finish(&mut self) -> StepLog<S> {
        core::mem::take(&mut self.steps)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn recorder_starts_fresh_on_each_call() {
        let mut recorder: StepRecorder<u8> = StepRecorder::new();
        recorder.record(StepDraft::highlight("stale"), 0, || None);

        recorder.begin();
        recorder.record(StepDraft::create("make a node", 7).keys([7]), 1, || Some(1));
        recorder.record(StepDraft::complete("done"), 2, || Some(2));
        let steps = recorder.finish();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kind(), StepKind::Create);
        assert_eq!(steps[0].creating_value(), Some(7));
        assert_eq!(steps[0].highlighted_keys().iter().copied().collect::<Vec<_>>(), vec![7]);
        assert_eq!(steps[1].tree(), Some(&2));
        assert!(recorder.finish().is_empty());
    }

    #[test]
    fn map_tree_keeps_metadata() {
        let mut recorder: StepRecorder<u8> = StepRecorder::new();
        recorder.record(StepDraft::split("overflow").overflow([1, 2, 3]), 0, || Some(4));
        let step = recorder.finish().remove(0).map_tree(u32::from);

        assert_eq!(step.kind(), StepKind::Split);
        assert_eq!(step.description(), "overflow");
        assert_eq!(step.overflow_keys().len(), 3);
        assert_eq!(step.tree(), Some(&4u32));
    }

    #[test]
    fn unchanged_revision_shares_snapshot() {
        let mut recorder: StepRecorder<u8> = StepRecorder::new();
        let mut taken = 0;
        for (revision, value) in [(1, 10), (1, 11), (1, 12), (2, 20), (2, 21)] {
            recorder.record(StepDraft::highlight("step"), revision, || {
                taken += 1;
                Some(value)
            });
        }
        let steps = recorder.finish();

        assert_eq!(taken, 2);
        let trees: Vec<_> = steps.iter().map(|s| s.tree().copied()).collect();
        assert_eq!(trees, vec![Some(10), Some(10), Some(10), Some(20), Some(20)]);
        assert!(Arc::ptr_eq(steps[0].tree.as_ref().unwrap(), steps[2].tree.as_ref().unwrap()));
    }

    #[test]
    fn folded_draft_keeps_later_kind() {
        let draft = StepDraft::rotate("borrow").keys([3]).after(StepDraft::merge("merge").keys([1]));
        assert_eq!(draft.kind(), StepKind::Rotate);

        let mut recorder: StepRecorder<u8> = StepRecorder::new();
        recorder.record(draft, 0, || None);
        let step = recorder.finish().remove(0);
        assert_eq!(step.description(), "merge; borrow");
        assert_eq!(step.highlighted_keys().iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }
}
