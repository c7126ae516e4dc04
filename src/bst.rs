//! Unbalanced binary search tree with a step trace.

use alloc::format;
use alloc::vec::Vec;
use core::cmp::Ordering::{Equal, Greater, Less};

use crate::Key;
use crate::raw::{Handle, RawBinaryTree, Side, Slot};
use crate::snapshot::BinarySnapshot;
use crate::step::{StepDraft, StepLog, StepRecorder};

/// A binary search tree that records every comparison and relink it performs.
///
/// Values are unique; inserting an existing value only records that it is already present.
/// A node with two children is deleted by copying in its predecessor or successor, taken from the
/// taller subtree, then the one with more nodes, then the left.
///
/// Every mutation is followed by a full copy of the tree for the next step, and sorted input makes
/// the tree as deep as it is large, so a run of `n` ascending inserts copies `O(n^2)` nodes. Keep
/// trees meant for playback small.
///
/// # Examples
///
/// ```
/// use tree_trace::{Bst, StepKind};
///
/// let mut tree = Bst::new();
/// for value in [50, 30, 70, 20, 40] {
///     tree.insert(value);
/// }
/// assert_eq!(tree.to_vec(), [20, 30, 40, 50, 70]);
///
/// let steps = tree.delete(30);
/// assert_eq!(steps.first().map(|s| s.kind()), Some(StepKind::Highlight));
/// assert_eq!(steps.last().map(|s| s.kind()), Some(StepKind::Complete));
/// assert_eq!(tree.to_vec(), [20, 40, 50, 70]);
/// ```
pub struct Bst {
    raw: RawBinaryTree,
    log: StepRecorder<BinarySnapshot>,
}

impl Bst {
    pub const fn new() -> Self {
        Self {
            raw: RawBinaryTree::new(),
            log: StepRecorder::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    pub fn contains(&self, value: Key) -> bool {
        self.raw.contains(value)
    }

    /// Values in ascending order.
    pub fn to_vec(&self) -> Vec<Key> {
        self.raw.in_order()
    }

    /// Independent copy of the current tree.
    pub fn snapshot(&self) -> Option<BinarySnapshot> {
        self.raw.snapshot()
    }

    /// Inserts `value` and returns the steps taken.
    pub fn insert(&mut self, value: Key) -> StepLog<BinarySnapshot> {
        tracing::debug!(value, "bst insert");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Insert {value}")).keys([value]));
        self.insert_at(value);
        self.record(StepDraft::complete(format!("Insert of {value} complete")));
        self.log.finish()
    }

    /// Deletes `value` and returns the steps taken.
    pub fn delete(&mut self, value: Key) -> StepLog<BinarySnapshot> {
        tracing::debug!(value, "bst delete");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Delete {value}")).keys([value]));
        self.delete_at(Slot::Root, value);
        self.record(StepDraft::complete(format!("Delete of {value} complete")));
        self.log.finish()
    }

    fn record(&mut self, draft: StepDraft) {
        self.log.record(draft, self.raw.revision(), || self.raw.snapshot());
    }

    /// Descends from the root to the empty slot for `value`, then refreshes heights back up the
    /// visited path. Sorted input makes the path as long as the tree, so it is a loop, not recursion.
    fn insert_at(&mut self, value: Key) {
        let mut path: Vec<Handle> = Vec::new();
        let mut slot = Slot::Root;
        while let Some(handle) = self.raw.get(slot) {
            let current = self.raw.node(handle).value();
            slot = match value.cmp(&current) {
                Less => {
                    self.record(StepDraft::highlight(format!("{value} < {current}, go left")).keys([current]));
                    Slot::Left(handle)
                }
                Greater => {
                    self.record(StepDraft::highlight(format!("{value} > {current}, go right")).keys([current]));
                    Slot::Right(handle)
                }
                Equal => {
                    self.record(StepDraft::highlight(format!("{value} already exists")).keys([value]));
                    return;
                }
            };
            path.push(handle);
        }

        self.record(StepDraft::create("Create an empty node", value));
        let node = self.raw.alloc(value);
        self.raw.set(slot, Some(node));
        self.record(StepDraft::insert(format!("Placed {value} in the new node")).keys([value]));
        self.refresh_heights(&path);
    }

    /// Descends from `slot` to `value` and removes it, refreshing heights on the way back.
    fn delete_at(&mut self, mut slot: Slot, value: Key) {
        let mut path: Vec<Handle> = Vec::new();
        loop {
            let Some(handle) = self.raw.get(slot) else {
                self.record(StepDraft::highlight(format!("{value} not found")));
                return;
            };

            let current = self.raw.node(handle).value();
            slot = match value.cmp(&current) {
                Less => {
                    self.record(StepDraft::highlight(format!("{value} < {current}, go left")).keys([current]));
                    Slot::Left(handle)
                }
                Greater => {
                    self.record(StepDraft::highlight(format!("{value} > {current}, go right")).keys([current]));
                    Slot::Right(handle)
                }
                Equal => {
                    self.record(StepDraft::highlight(format!("Found {value}")).keys([value]));
                    self.remove_node(slot, handle);
                    break;
                }
            };
            path.push(handle);
        }
        self.refresh_heights(&path);
    }

    /// Recomputes heights from the deepest visited node up to the root.
    fn refresh_heights(&mut self, path: &[Handle]) {
        for &handle in path.iter().rev() {
            self.raw.update_height(handle);
        }
    }

    fn remove_node(&mut self, slot: Slot, handle: Handle) {
        let node = self.raw.node(handle);
        let (value, left, right) = (node.value(), node.left(), node.right());

        let replacement = match (left, right) {
            (None, None) => {
                self.record(StepDraft::delete(format!("Remove leaf node {value}")).keys([value]));
                None
            }
            (Some(child), None) => {
                self.record(StepDraft::delete(format!("Replace {value} with its left child")).keys([value]));
                Some(child)
            }
            (None, Some(child)) => {
                self.record(StepDraft::delete(format!("Replace {value} with its right child")).keys([value]));
                Some(child)
            }
            (Some(left), Some(right)) => {
                self.replace_from_subtree(handle, value, left, right);
                return;
            }
        };

        self.raw.set(slot, replacement);
        self.raw.free(handle);
        if slot == Slot::Root && replacement.is_none() {
            self.record(StepDraft::delete("The tree is now empty"));
        }
    }

    /// Copies the predecessor or successor into `handle`, then deletes it from its subtree.
    fn replace_from_subtree(&mut self, handle: Handle, value: Key, left: Handle, right: Handle) {
        let (side, reason) = self.raw.replacement_side(handle);
        self.record(StepDraft::highlight(reason.describe()).keys([value]));

        let (replacement, label, slot) = match side {
            Side::Left => (self.raw.max_value(left), "predecessor", Slot::Left(handle)),
            Side::Right => (self.raw.min_value(right), "successor", Slot::Right(handle)),
        };
        self.record(StepDraft::highlight(format!("Found {label} {replacement}")).keys([replacement]));

        self.raw.set_value(handle, replacement);
        self.record(StepDraft::highlight(format!("Replace {value} with {replacement}")).keys([replacement]));

        self.delete_at(slot, replacement);
        self.raw.update_height(handle);
    }
}

impl Default for Bst {
    fn default() -> Self {
        Self::new()
    }
}
