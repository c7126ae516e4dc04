use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use super::arena::Arena;
use super::handle::Handle;
use crate::Key;
use crate::snapshot::BinarySnapshot;

/// Node of a BST or AVL tree.
pub(crate) struct BinaryNode {
    value: Key,
    left: Option<Handle>,
    right: Option<Handle>,
    // Height of the subtree rooted here (a lone node has height 1).
    height: u32,
    // height(left) - height(right), refreshed together with `height`.
    balance: i32,
}

impl BinaryNode {
    fn new(value: Key) -> Self {
        Self {
            value,
            left: None,
            right: None,
            height: 1,
            balance: 0,
        }
    }

    #[inline]
    pub(crate) fn value(&self) -> Key {
        self.value
    }

    #[inline]
    pub(crate) fn left(&self) -> Option<Handle> {
        self.left
    }

    #[inline]
    pub(crate) fn right(&self) -> Option<Handle> {
        self.right
    }

    #[inline]
    pub(crate) fn balance(&self) -> i32 {
        self.balance
    }
}

/// Where a subtree hangs: the root pointer, or one side of a parent.
///
/// Mutations relink through the slot as soon as they happen, so a snapshot taken mid-operation
/// always shows the whole live tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Slot {
    Root,
    Left(Handle),
    Right(Handle),
}

/// Subtree a two-child deletion takes its replacement from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    /// Predecessor: the largest value of the left subtree.
    Left,
    /// Successor: the smallest value of the right subtree.
    Right,
}

/// Why a side was chosen, in the order the criteria are tried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Tiebreak {
    Height { left: u32, right: u32 },
    Count { left: usize, right: usize },
    PreferLeft,
}

impl Tiebreak {
    pub(crate) fn describe(self) -> String {
        match self {
            Tiebreak::Height { left, right } if left > right => {
                format!("Left height ({left}) > right height ({right}), take the predecessor")
            }
            Tiebreak::Height { left, right } => {
                format!("Right height ({right}) > left height ({left}), take the successor")
            }
            Tiebreak::Count { left, right } if left > right => {
                format!("Heights equal, left has more nodes ({left} > {right}), take the predecessor")
            }
            Tiebreak::Count { left, right } => {
                format!("Heights equal, right has more nodes ({right} > {left}), take the successor")
            }
            Tiebreak::PreferLeft => "Heights and node counts equal, prefer the predecessor".into(),
        }
    }
}

/// Arena-backed binary search tree core shared by the BST and AVL engines.
pub(crate) struct RawBinaryTree {
    nodes: Arena<BinaryNode>,
    root: Option<Handle>,
    // Bumped by every mutation, so unchanged trees can reuse their last snapshot.
    revision: u64,
}

impl RawBinaryTree {
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
            revision: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) const fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub(crate) fn node(&self, handle: Handle) -> &BinaryNode {
        self.nodes.get(handle)
    }

    /// The subtree currently hanging from `slot`.
    pub(crate) fn get(&self, slot: Slot) -> Option<Handle> {
        match slot {
            Slot::Root => self.root,
            Slot::Left(parent) => self.nodes.get(parent).left,
            Slot::Right(parent) => self.nodes.get(parent).right,
        }
    }

    /// Hangs `subtree` from `slot`.
    pub(crate) fn set(&mut self, slot: Slot, subtree: Option<Handle>) {
        self.revision += 1;
        match slot {
            Slot::Root => self.root = subtree,
            Slot::Left(parent) => self.nodes.get_mut(parent).left = subtree,
            Slot::Right(parent) => self.nodes.get_mut(parent).right = subtree,
        }
    }

    /// Allocates a detached node.
    pub(crate) fn alloc(&mut self, value: Key) -> Handle {
        self.revision += 1;
        self.nodes.alloc(BinaryNode::new(value))
    }

    pub(crate) fn free(&mut self, handle: Handle) {
        self.revision += 1;
        self.nodes.free(handle);
    }

    pub(crate) fn set_value(&mut self, handle: Handle, value: Key) {
        self.revision += 1;
        self.nodes.get_mut(handle).value = value;
    }

    pub(crate) fn height(&self, subtree: Option<Handle>) -> u32 {
        subtree.map_or(0, |h| self.nodes.get(h).height)
    }

    /// Recomputes height and balance factor from the children.
    pub(crate) fn update_height(&mut self, handle: Handle) {
        let node = self.nodes.get(handle);
        let left = self.height(node.left);
        let right = self.height(node.right);
        self.revision += 1;
        let node = self.nodes.get_mut(handle);
        node.height = 1 + left.max(right);
        #[allow(clippy::cast_possible_wrap)]
        {
            node.balance = left as i32 - right as i32;
        }
    }

    /// Number of nodes under `subtree`, walked with an explicit stack since an unbalanced subtree
    /// can be as deep as it is large.
    pub(crate) fn count(&self, subtree: Option<Handle>) -> usize {
        let mut stack: Vec<Handle> = subtree.into_iter().collect();
        let mut count = 0;
        while let Some(h) = stack.pop() {
            let node = self.nodes.get(h);
            count += 1;
            stack.extend(node.left);
            stack.extend(node.right);
        }
        count
    }

    pub(crate) fn contains(&self, value: Key) -> bool {
        let mut current = self.root;
        while let Some(h) = current {
            let node = self.nodes.get(h);
            current = match value.cmp(&node.value) {
                core::cmp::Ordering::Less => node.left,
                core::cmp::Ordering::Greater => node.right,
                core::cmp::Ordering::Equal => return true,
            };
        }
        false
    }

    /// Smallest value of the subtree rooted at `handle`.
    pub(crate) fn min_value(&self, mut handle: Handle) -> Key {
        while let Some(left) = self.nodes.get(handle).left {
            handle = left;
        }
        self.nodes.get(handle).value
    }

    /// Largest value of the subtree rooted at `handle`.
    pub(crate) fn max_value(&self, mut handle: Handle) -> Key {
        while let Some(right) = self.nodes.get(handle).right {
            handle = right;
        }
        self.nodes.get(handle).value
    }

    /// Picks the replacement side for a node with two children: the taller subtree, then the one
    /// with more nodes, then the left.
    pub(crate) fn replacement_side(&self, handle: Handle) -> (Side, Tiebreak) {
        let node = self.nodes.get(handle);
        let left = self.height(node.left);
        let right = self.height(node.right);
        if left != right {
            let side = if left > right { Side::Left } else { Side::Right };
            return (side, Tiebreak::Height { left, right });
        }

        let left = self.count(node.left);
        let right = self.count(node.right);
        match left.cmp(&right) {
            core::cmp::Ordering::Greater => (Side::Left, Tiebreak::Count { left, right }),
            core::cmp::Ordering::Less => (Side::Right, Tiebreak::Count { left, right }),
            core::cmp::Ordering::Equal => (Side::Left, Tiebreak::PreferLeft),
        }
    }

    /// Rotates the subtree at `slot` to the right and returns the new sub-root.
    ///
    /// Returns `None` without touching the tree if the slot is empty or has no left child.
    pub(crate) fn rotate_right(&mut self, slot: Slot) -> Option<Handle> {
        let pivot = self.get(slot)?;
        let child = self.nodes.get(pivot).left?;
        let inner = self.nodes.get(child).right;

        self.revision += 1;
        self.nodes.get_mut(pivot).left = inner;
        self.nodes.get_mut(child).right = Some(pivot);
        self.update_height(pivot);
        self.update_height(child);
        self.set(slot, Some(child));
        Some(child)
    }

    /// Rotates the subtree at `slot` to the left and returns the new sub-root.
    ///
    /// Returns `None` without touching the tree if the slot is empty or has no right child.
    pub(crate) fn rotate_left(&mut self, slot: Slot) -> Option<Handle> {
        let pivot = self.get(slot)?;
        let child = self.nodes.get(pivot).right?;
        let inner = self.nodes.get(child).left;

        self.revision += 1;
        self.nodes.get_mut(pivot).right = inner;
        self.nodes.get_mut(child).left = Some(pivot);
        self.update_height(pivot);
        self.update_height(child);
        self.set(slot, Some(child));
        Some(child)
    }

    pub(crate) fn in_order(&self) -> Vec<Key> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<Handle> = Vec::new();
        let mut current = self.root;
        while current.is_some() || !stack.is_empty() {
            while let Some(h) = current {
                stack.push(h);
                current = self.nodes.get(h).left;
            }
            if let Some(h) = stack.pop() {
                let node = self.nodes.get(h);
                out.push(node.value);
                current = node.right;
            }
        }
        out
    }

    /// Deep copy of the whole tree, or `None` when empty.
    pub(crate) fn snapshot(&self) -> Option<BinarySnapshot> {
        self.root.map(|root| {
            BinarySnapshot::build(root, |h| {
                let node = self.nodes.get(h);
                (node.value, node.height, node.balance, node.left, node.right)
            })
        })
    }
}
