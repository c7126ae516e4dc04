//! Height-balanced (AVL) binary search tree with a step trace.

use alloc::format;
use alloc::vec::Vec;
use core::cmp::Ordering::{Equal, Greater, Less};
use core::fmt;

use crate::Key;
use crate::raw::{Handle, RawBinaryTree, Side, Slot};
use crate::snapshot::BinarySnapshot;
use crate::step::{StepDraft, StepLog, StepRecorder};

/// The four AVL imbalance shapes, named by the path from the unbalanced node to its tall grandchild.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Imbalance {
    LeftLeft,
    RightRight,
    LeftRight,
    RightLeft,
}

impl fmt::Display for Imbalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Imbalance::LeftLeft => "LL",
            Imbalance::RightRight => "RR",
            Imbalance::LeftRight => "LR",
            Imbalance::RightLeft => "RL",
        })
    }
}

/// What triggered a rebalance check, which decides how the imbalance case is classified.
#[derive(Clone, Copy)]
enum Cause {
    /// An insert of this value: compare it against the tall child.
    Inserted(Key),
    /// A delete: use the tall child's own balance factor.
    Deleted,
}

/// An AVL tree that records every comparison, balance check and rotation it performs.
///
/// Deletion picks replacements exactly like [`Bst`](crate::Bst); every node on a changed path then
/// has its height and balance factor refreshed and is rotated back into `{-1, 0, 1}` if needed.
///
/// # Examples
///
/// ```
/// use tree_trace::{AvlTree, StepKind};
///
/// let mut tree = AvlTree::new();
/// tree.insert(10);
/// tree.insert(20);
/// let steps = tree.insert(30);
///
/// assert!(steps.iter().any(|s| s.kind() == StepKind::Rotate));
/// let root = tree.snapshot().unwrap();
/// assert_eq!(root.value(), 20);
/// assert_eq!(root.height(), 2);
/// assert_eq!(root.balance_factor(), 0);
/// ```
pub struct AvlTree {
    raw: RawBinaryTree,
    log: StepRecorder<BinarySnapshot>,
}

impl AvlTree {
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

    /// Independent copy of the current tree, including heights and balance factors.
    pub fn snapshot(&self) -> Option<BinarySnapshot> {
        self.raw.snapshot()
    }

    /// Inserts `value`, rebalancing on the way back up, and returns the steps taken.
    pub fn insert(&mut self, value: Key) -> StepLog<BinarySnapshot> {
        tracing::debug!(value, "avl insert");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Insert {value}")).keys([value]));
        self.insert_at(Slot::Root, value);
        self.record(StepDraft::complete(format!("Insert of {value} complete")));
        self.log.finish()
    }

    /// Deletes `value`, rebalancing on the way back up, and returns the steps taken.
    pub fn delete(&mut self, value: Key) -> StepLog<BinarySnapshot> {
        tracing::debug!(value, "avl delete");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Delete {value}")).keys([value]));
        self.delete_at(Slot::Root, value);
        self.record(StepDraft::complete(format!("Delete of {value} complete")));
        self.log.finish()
    }

    fn record(&mut self, draft: StepDraft) {
        self.log.record(draft, self.raw.revision(), || self.raw.snapshot());
    }

    fn insert_at(&mut self, slot: Slot, value: Key) -> bool {
        let Some(handle) = self.raw.get(slot) else {
            self.record(StepDraft::create("Create an empty node", value));
            let node = self.raw.alloc(value);
            self.raw.set(slot, Some(node));
            self.record(StepDraft::insert(format!("Placed {value} in the new node")).keys([value]));
            return true;
        };

        let current = self.raw.node(handle).value();
        let inserted = match value.cmp(&current) {
            Less => {
                self.record(StepDraft::highlight(format!("{value} < {current}, go left")).keys([current]));
                self.insert_at(Slot::Left(handle), value)
            }
            Greater => {
                self.record(StepDraft::highlight(format!("{value} > {current}, go right")).keys([current]));
                self.insert_at(Slot::Right(handle), value)
            }
            Equal => {
                self.record(StepDraft::highlight(format!("{value} already exists")).keys([value]));
                false
            }
        };
        if inserted {
            self.rebalance(slot, handle, Cause::Inserted(value));
        }
        inserted
    }

    fn delete_at(&mut self, slot: Slot, value: Key) -> bool {
        let Some(handle) = self.raw.get(slot) else {
            self.record(StepDraft::highlight(format!("{value} not found")));
            return false;
        };

        let current = self.raw.node(handle).value();
        let removed = match value.cmp(&current) {
            Less => {
                self.record(StepDraft::highlight(format!("{value} < {current}, go left")).keys([current]));
                self.delete_at(Slot::Left(handle), value)
            }
            Greater => {
                self.record(StepDraft::highlight(format!("{value} > {current}, go right")).keys([current]));
                self.delete_at(Slot::Right(handle), value)
            }
            Equal => {
                self.record(StepDraft::highlight(format!("Found {value}")).keys([value]));
                return self.remove_node(slot, handle);
            }
        };
        if removed {
            self.rebalance(slot, handle, Cause::Deleted);
        }
        removed
    }

    fn remove_node(&mut self, slot: Slot, handle: Handle) -> bool {
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
                let (side, reason) = self.raw.replacement_side(handle);
                self.record(StepDraft::highlight(reason.describe()).keys([value]));

                let (replacement, label, child_slot) = match side {
                    Side::Left => (self.raw.max_value(left), "predecessor", Slot::Left(handle)),
                    Side::Right => (self.raw.min_value(right), "successor", Slot::Right(handle)),
                };
                self.record(StepDraft::highlight(format!("Found {label} {replacement}")).keys([replacement]));

                self.raw.set_value(handle, replacement);
                self.record(StepDraft::highlight(format!("Replace {value} with {replacement}")).keys([replacement]));

                self.delete_at(child_slot, replacement);
                self.rebalance(slot, handle, Cause::Deleted);
                return true;
            }
        };

        self.raw.set(slot, replacement);
        self.raw.free(handle);
        if slot == Slot::Root && replacement.is_none() {
            self.record(StepDraft::delete("The tree is now empty"));
        }
        true
    }

    /// Refreshes `handle`'s height and rotates the subtree at `slot` if it is out of balance.
    fn rebalance(&mut self, slot: Slot, handle: Handle, cause: Cause) {
        self.raw.update_height(handle);
        let node = self.raw.node(handle);
        let (value, balance, left, right) = (node.value(), node.balance(), node.left(), node.right());
        self.record(StepDraft::highlight(format!("Balance factor of {value}: {balance}")).keys([value]));

        let imbalance = if balance > 1 {
            let Some(left) = left else { return };
            let left = self.raw.node(left);
            let outer = match cause {
                Cause::Inserted(inserted) => inserted < left.value(),
                Cause::Deleted => left.balance() >= 0,
            };
            if outer { Imbalance::LeftLeft } else { Imbalance::LeftRight }
        } else if balance < -1 {
            let Some(right) = right else { return };
            let right = self.raw.node(right);
            let outer = match cause {
                Cause::Inserted(inserted) => inserted > right.value(),
                Cause::Deleted => right.balance() <= 0,
            };
            if outer { Imbalance::RightRight } else { Imbalance::RightLeft }
        } else {
            return;
        };

        tracing::trace!(value, balance, %imbalance, "avl rebalance");
        self.record(StepDraft::rotate(format!("{imbalance} imbalance at {value} (balance {balance})")).keys([value]));
        match imbalance {
            Imbalance::LeftLeft => self.rotate_right(slot),
            Imbalance::RightRight => self.rotate_left(slot),
            Imbalance::LeftRight => {
                self.rotate_left(Slot::Left(handle));
                self.rotate_right(slot);
            }
            Imbalance::RightLeft => {
                self.rotate_right(Slot::Right(handle));
                self.rotate_left(slot);
            }
        }
    }

    fn rotate_right(&mut self, slot: Slot) {
        let Some(pivot) = self.raw.get(slot) else { return };
        let Some(child) = self.raw.node(pivot).left() else { return };
        let (pivot, child) = (self.raw.node(pivot).value(), self.raw.node(child).value());

        self.record(
            StepDraft::rotate(format!("Rotate right at {pivot}: {child} becomes the sub-root")).keys([pivot, child]),
        );
        self.raw.rotate_right(slot);
        self.record(StepDraft::rotate(format!("Rotated right: {child} is the new sub-root")).keys([child]));
    }

    fn rotate_left(&mut self, slot: Slot) {
        let Some(pivot) = self.raw.get(slot) else { return };
        let Some(child) = self.raw.node(pivot).right() else { return };
        let (pivot, child) = (self.raw.node(pivot).value(), self.raw.node(child).value());

        self.record(
            StepDraft::rotate(format!("Rotate left at {pivot}: {child} becomes the sub-root")).keys([pivot, child]),
        );
        self.raw.rotate_left(slot);
        self.record(StepDraft::rotate(format!("Rotated left: {child} is the new sub-root")).keys([child]));
    }
}

impl Default for AvlTree {
    fn default() -> Self {
        Self::new()
    }
}
