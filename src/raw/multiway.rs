use alloc::vec::Vec;

use smallvec::SmallVec;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{InternalNode, Node};
use crate::Key;
use crate::snapshot::MultiwaySnapshot;

/// Path element for tracking traversal during mutations.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PathElement {
    /// Handle to the node at this level.
    pub(crate) node: Handle,
    /// Index of the child we descended into.
    pub(crate) child_index: usize,
}

/// Type alias for a path through the tree (stack of path elements).
pub(crate) type Path = SmallVec<[PathElement; 16]>;

/// Adjacent sibling chosen to repair an underflowing child.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Sibling {
    Left(Handle),
    Right(Handle),
}

/// Arena-backed multiway tree core shared by the B-tree and B+tree engines.
pub(crate) struct RawMultiwayTree {
    /// Arena storing all tree nodes.
    nodes: Arena<Node>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Number of distinct values stored.
    len: usize,
    /// Bumped by every mutable access, so unchanged trees can reuse their last snapshot.
    revision: u64,
}

impl RawMultiwayTree {
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
            len: 0,
            revision: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn root(&self) -> Option<Handle> {
        self.root
    }

    #[inline]
    pub(crate) fn node(&self, handle: Handle) -> &Node {
        self.nodes.get(handle)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, handle: Handle) -> &mut Node {
        self.revision += 1;
        self.nodes.get_mut(handle)
    }

    pub(crate) fn alloc(&mut self, node: Node) -> Handle {
        self.revision += 1;
        self.nodes.alloc(node)
    }

    pub(crate) fn take(&mut self, handle: Handle) -> Node {
        self.revision += 1;
        self.nodes.take(handle)
    }

    /// Starts a tree holding a single key in a root leaf.
    pub(crate) fn plant(&mut self, key: Key) -> Handle {
        self.revision += 1;
        let root = self.nodes.alloc(Node::leaf_with(key));
        self.root = Some(root);
        self.len = 1;
        root
    }

    pub(crate) fn note_inserted(&mut self) {
        self.len += 1;
    }

    /// Records one removed key. Returns `true` when that emptied the tree, in which case every node
    /// has been released.
    pub(crate) fn note_removed(&mut self) -> bool {
        self.len -= 1;
        if self.len == 0 {
            self.revision += 1;
            self.nodes.clear();
            self.root = None;
            return true;
        }
        false
    }

    /// Places a new root above a split old root.
    pub(crate) fn grow_root(&mut self, left: Handle, key: Key, right: Handle) -> Handle {
        self.revision += 1;
        let root = self.nodes.alloc(Node::Internal(InternalNode::with_children(left, key, right)));
        self.root = Some(root);
        root
    }

    /// Replaces an internal root that lost its last key with its only child.
    /// Returns the new root when a collapse happened.
    pub(crate) fn collapse_root(&mut self) -> Option<Handle> {
        let root = self.root?;
        match self.nodes.get(root) {
            Node::Internal(internal) if internal.key_count() == 0 => {
                let child = internal.child(0);
                self.revision += 1;
                self.nodes.free(root);
                self.root = Some(child);
                Some(child)
            }
            _ => None,
        }
    }

    /// The adjacent sibling of `parent`'s child `child_index` with more keys; ties favor the left.
    pub(crate) fn best_sibling(&self, parent: Handle, child_index: usize) -> Option<Sibling> {
        let parent = self.nodes.get(parent).as_internal();
        let left = child_index.checked_sub(1).map(|i| parent.child(i));
        let right = (child_index + 1 < parent.child_count()).then(|| parent.child(child_index + 1));
        match (left, right) {
            (Some(l), Some(r)) if self.nodes.get(r).key_count() > self.nodes.get(l).key_count() => {
                Some(Sibling::Right(r))
            }
            (Some(l), _) => Some(Sibling::Left(l)),
            (None, Some(r)) => Some(Sibling::Right(r)),
            (None, None) => None,
        }
    }

    /// Leftmost leaf, where the B+tree leaf chain starts.
    pub(crate) fn first_leaf(&self) -> Option<Handle> {
        let mut current = self.root?;
        while let Node::Internal(internal) = self.nodes.get(current) {
            current = internal.child(0);
        }
        Some(current)
    }

    /// Keys of every node, interleaved with the children between them.
    pub(crate) fn in_order(&self) -> Vec<Key> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = self.root {
            self.collect_in_order(root, &mut out);
        }
        out
    }

    fn collect_in_order(&self, handle: Handle, out: &mut Vec<Key>) {
        match self.nodes.get(handle) {
            Node::Leaf(leaf) => out.extend_from_slice(leaf.keys()),
            Node::Internal(internal) => {
                for (i, &child) in internal.children().iter().enumerate() {
                    self.collect_in_order(child, out);
                    if i < internal.key_count() {
                        out.push(internal.key(i));
                    }
                }
            }
        }
    }

    /// Leaves visited by following `next` from the leftmost leaf.
    pub(crate) fn leaf_chain(&self) -> Vec<Vec<Key>> {
        let mut chain = Vec::new();
        let mut current = self.first_leaf();
        while let Some(handle) = current {
            let leaf = self.nodes.get(handle).as_leaf();
            chain.push(leaf.to_vec());
            current = leaf.next();
        }
        chain
    }

    /// Deep copy of the whole tree, or `None` when empty.
    pub(crate) fn snapshot(&self) -> Option<MultiwaySnapshot> {
        self.root.map(|root| self.snapshot_from(root))
    }

    fn snapshot_from(&self, handle: Handle) -> MultiwaySnapshot {
        match self.nodes.get(handle) {
            Node::Leaf(leaf) => MultiwaySnapshot::leaf(leaf.to_vec()),
            Node::Internal(internal) => MultiwaySnapshot::internal(
                internal.keys().to_vec(),
                internal.children().iter().map(|&child| self.snapshot_from(child)).collect(),
            ),
        }
    }
}
