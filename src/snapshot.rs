//! Immutable copies of a tree taken while an operation runs.
//!
//! A snapshot shares nothing with the live tree, so a recorded step keeps showing the state it was
//! taken in no matter what the engine does afterwards.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use serde::Serialize;

use crate::Key;

/// Deep copy of a binary (BST or AVL) subtree.
///
/// An unbalanced BST can be as deep as it is large, so building, cloning, comparing and dropping
/// a snapshot all walk it with an explicit stack.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinarySnapshot {
    value: Key,
    height: u32,
    balance_factor: i32,
    left: Option<Box<BinarySnapshot>>,
    right: Option<Box<BinarySnapshot>>,
}

impl BinarySnapshot {
    pub(crate) fn new(
        value: Key,
        height: u32,
        balance_factor: i32,
        left: Option<BinarySnapshot>,
        right: Option<BinarySnapshot>,
    ) -> Self {
        Self {
            value,
            height,
            balance_factor,
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }

    pub fn value(&self) -> Key {
        self.value
    }

    /// Height of this subtree; a lone node has height 1.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `height(left) - height(right)` as recorded by the engine.
    pub fn balance_factor(&self) -> i32 {
        self.balance_factor
    }

    pub fn left(&self) -> Option<&BinarySnapshot> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&BinarySnapshot> {
        self.right.as_deref()
    }

    /// Builds a snapshot bottom-up from `root`. `visit` returns a node's value, height, balance
    /// factor and children.
    pub(crate) fn build<N: Copy>(
        root: N,
        mut visit: impl FnMut(N) -> (Key, u32, i32, Option<N>, Option<N>),
    ) -> Self {
        enum Frame<N> {
            Enter(N),
            Leave { value: Key, height: u32, balance_factor: i32, left: bool, right: bool },
        }

        let mut frames = vec![Frame::Enter(root)];
        // Finished subtrees; a node's left result sits just below its right one.
        let mut built: Vec<BinarySnapshot> = Vec::new();
        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Enter(node) => {
                    let (value, height, balance_factor, left, right) = visit(node);
                    frames.push(Frame::Leave {
                        value,
                        height,
                        balance_factor,
                        left: left.is_some(),
                        right: right.is_some(),
                    });
                    frames.extend(right.map(Frame::Enter));
                    frames.extend(left.map(Frame::Enter));
                }
                Frame::Leave { value, height, balance_factor, left, right } => {
                    let right = if right { built.pop() } else { None };
                    let left = if left { built.pop() } else { None };
                    built.push(BinarySnapshot::new(value, height, balance_factor, left, right));
                }
            }
        }
        built.pop().expect("`BinarySnapshot::build()` - root was never finished")
    }

    /// Every node of this subtree, in preorder.
    fn preorder(&self) -> impl Iterator<Item = &BinarySnapshot> {
        let mut stack = vec![self];
        core::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.right());
            stack.extend(node.left());
            Some(node)
        })
    }

    /// Values in ascending (inorder) order.
    pub fn in_order(&self) -> Vec<Key> {
        let mut out = Vec::new();
        let mut stack: Vec<&BinarySnapshot> = Vec::new();
        let mut current = Some(self);
        while current.is_some() || !stack.is_empty() {
            while let Some(node) = current {
                stack.push(node);
                current = node.left();
            }
            if let Some(node) = stack.pop() {
                out.push(node.value);
                current = node.right();
            }
        }
        out
    }

    /// Number of nodes in this subtree.
    pub fn len(&self) -> usize {
        self.preorder().count()
    }

    /// Always `false`: a snapshot holds at least its own node.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Clone for BinarySnapshot {
    fn clone(&self) -> Self {
        Self::build(self, |node| {
            (node.value, node.height, node.balance_factor, node.left(), node.right())
        })
    }
}

impl PartialEq for BinarySnapshot {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];
        while let Some((a, b)) = pairs.pop() {
            if (a.value, a.height, a.balance_factor) != (b.value, b.height, b.balance_factor) {
                return false;
            }
            for (a, b) in [(a.left(), b.left()), (a.right(), b.right())] {
                match (a, b) {
                    (Some(a), Some(b)) => pairs.push((a, b)),
                    (None, None) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

impl Eq for BinarySnapshot {}

impl Drop for BinarySnapshot {
    fn drop(&mut self) {
        let mut detached: Vec<Box<BinarySnapshot>> = Vec::new();
        detached.extend(self.left.take());
        detached.extend(self.right.take());
        while let Some(mut node) = detached.pop() {
            detached.extend(node.left.take());
            detached.extend(node.right.take());
        }
    }
}

/// Deep copy of a multiway (B-tree or B+tree) subtree.
///
/// The B+tree leaf chain is not copied; leaves of a snapshot are ordered left to right, which is
/// the order the chain visits them in.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiwaySnapshot {
    keys: Vec<Key>,
    children: Vec<MultiwaySnapshot>,
    is_leaf: bool,
}

impl MultiwaySnapshot {
    pub(crate) fn leaf(keys: Vec<Key>) -> Self {
        Self {
            keys,
            children: Vec::new(),
            is_leaf: true,
        }
    }

    pub(crate) fn internal(keys: Vec<Key>, children: Vec<MultiwaySnapshot>) -> Self {
        Self {
            keys,
            children,
            is_leaf: false,
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn children(&self) -> &[MultiwaySnapshot] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// B-tree readout: keys of every node, interleaved with the children between them.
    pub fn in_order(&self) -> Vec<Key> {
        let mut out = Vec::new();
        self.collect_in_order(&mut out);
        out
    }

    fn collect_in_order(&self, out: &mut Vec<Key>) {
        if self.is_leaf {
            out.extend_from_slice(&self.keys);
            return;
        }
        for (i, child) in self.children.iter().enumerate() {
            child.collect_in_order(out);
            if let Some(&key) = self.keys.get(i) {
                out.push(key);
            }
        }
    }

    /// B+tree readout: the keys of all leaves, left to right.
    pub fn leaf_keys(&self) -> Vec<Key> {
        let mut out = Vec::new();
        self.collect_leaf_keys(&mut out);
        out
    }

    fn collect_leaf_keys(&self, out: &mut Vec<Key>) {
        if self.is_leaf {
            out.extend_from_slice(&self.keys);
        } else {
            for child in &self.children {
                child.collect_leaf_keys(out);
            }
        }
    }

    /// Number of levels below and including this node.
    pub fn depth(&self) -> usize {
        1 + self.children.first().map_or(0, Self::depth)
    }
}

/// Snapshot of whichever tree family an [`AnyTree`](crate::AnyTree) holds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "family", content = "root", rename_all = "camelCase")]
pub enum TreeSnapshot {
    Binary(BinarySnapshot),
    Multiway(MultiwaySnapshot),
}

impl TreeSnapshot {
    /// Ascending key readout matching the engine's own `to_vec`.
    ///
    /// Multiway snapshots read leaves only when `leaves_only` is set (B+tree); otherwise all keys.
    pub fn keys(&self, leaves_only: bool) -> Vec<Key> {
        match self {
            TreeSnapshot::Binary(root) => root.in_order(),
            TreeSnapshot::Multiway(root) if leaves_only => root.leaf_keys(),
            TreeSnapshot::Multiway(root) => root.in_order(),
        }
    }
}

impl From<BinarySnapshot> for TreeSnapshot {
    fn from(root: BinarySnapshot) -> Self {
        TreeSnapshot::Binary(root)
    }
}

impl From<MultiwaySnapshot> for TreeSnapshot {
    fn from(root: MultiwaySnapshot) -> Self {
        TreeSnapshot::Multiway(root)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn binary_in_order() {
        let left = BinarySnapshot::new(10, 1, 0, None, None);
        let right = BinarySnapshot::new(30, 1, 0, None, None);
        let root = BinarySnapshot::new(20, 2, 0, Some(left), Some(right));

        assert_eq!(root.in_order(), vec![10, 20, 30]);
        assert_eq!(root.len(), 3);
        assert_eq!(root.left().map(BinarySnapshot::value), Some(10));
    }

    #[test]
    fn binary_equality_checks_shape() {
        let leaning_left = BinarySnapshot::new(2, 2, 1, Some(BinarySnapshot::new(1, 1, 0, None, None)), None);
        let leaning_right = BinarySnapshot::new(2, 2, 1, None, Some(BinarySnapshot::new(1, 1, 0, None, None)));

        assert_eq!(leaning_left.clone(), leaning_left);
        assert_ne!(leaning_left, leaning_right);
    }

    #[test]
    fn multiway_readouts() {
        let root = MultiwaySnapshot::internal(
            vec![20],
            vec![MultiwaySnapshot::leaf(vec![10, 20]), MultiwaySnapshot::leaf(vec![30, 40])],
        );

        // As a B+tree the routing copy of 20 is read once, from its leaf.
        assert_eq!(root.leaf_keys(), vec![10, 20, 30, 40]);
        assert_eq!(root.in_order(), vec![10, 20, 20, 30, 40]);
        assert_eq!(root.depth(), 2);
    }
}
