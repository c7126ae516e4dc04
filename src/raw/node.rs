use alloc::vec::Vec;

use smallvec::SmallVec;

use super::handle::Handle;
use crate::Key;

// Orders used for teaching are small; nodes of larger orders spill to the heap.
const INLINE_KEYS: usize = 8;
const INLINE_CHILDREN: usize = INLINE_KEYS + 1;

type Keys = SmallVec<[Key; INLINE_KEYS]>;
type Children = SmallVec<[Handle; INLINE_CHILDREN]>;

/// Node of a B-tree or B+tree.
pub(crate) enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

/// Internal node: `keys.len() + 1` children.
///
/// In a B-tree the keys are live values. In a B+tree they are routing copies where `keys[i]` is the
/// largest key stored under `children[i]`.
pub(crate) struct InternalNode {
    keys: Keys,
    children: Children,
}

/// Leaf node. `next` links B+tree leaves left to right; B-tree leaves leave it unset.
pub(crate) struct LeafNode {
    next: Option<Handle>,
    keys: Keys,
}

pub(crate) enum SearchResult {
    Found(usize),
    /// Insertion point, which is also the child to descend into.
    NotFound(usize),
}

fn search(keys: &[Key], key: Key) -> SearchResult {
    match keys.binary_search(&key) {
        Ok(idx) => SearchResult::Found(idx),
        Err(idx) => SearchResult::NotFound(idx),
    }
}

impl Node {
    pub(crate) fn leaf_with(key: Key) -> Self {
        let mut leaf = LeafNode::new();
        leaf.keys.push(key);
        Node::Leaf(leaf)
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Panics on an internal node; callers only ask once the level is known.
    pub(crate) fn as_leaf(&self) -> &LeafNode {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("`Node::as_leaf()` - handle points at an internal node, not a leaf"),
        }
    }

    pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("`Node::as_leaf_mut()` - handle points at an internal node, not a leaf"),
        }
    }

    /// Unwraps a node already detached from the arena, such as a leaf absorbed by a merge.
    pub(crate) fn into_leaf(self) -> LeafNode {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("`Node::into_leaf()` - handle points at an internal node, not a leaf"),
        }
    }

    pub(crate) fn as_internal(&self) -> &InternalNode {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("`Node::as_internal()` - handle points at a leaf, not an internal node"),
        }
    }

    pub(crate) fn as_internal_mut(&mut self) -> &mut InternalNode {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("`Node::as_internal_mut()` - handle points at a leaf, not an internal node"),
        }
    }

    pub(crate) fn keys(&self) -> &[Key] {
        match self {
            Node::Internal(internal) => &internal.keys,
            Node::Leaf(leaf) => &leaf.keys,
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys().len()
    }

    pub(crate) fn search(&self, key: Key) -> SearchResult {
        search(self.keys(), key)
    }

    /// Removes the last key, and the last child of an internal node.
    pub(crate) fn pop_back(&mut self) -> Option<(Key, Option<Handle>)> {
        match self {
            Node::Internal(internal) => {
                let key = internal.keys.pop()?;
                Some((key, internal.children.pop()))
            }
            Node::Leaf(leaf) => leaf.keys.pop().map(|key| (key, None)),
        }
    }

    /// Removes the first key, and the first child of an internal node.
    pub(crate) fn pop_front(&mut self) -> Option<(Key, Option<Handle>)> {
        match self {
            Node::Internal(internal) if !internal.keys.is_empty() => {
                Some((internal.keys.remove(0), Some(internal.children.remove(0))))
            }
            Node::Leaf(leaf) if !leaf.keys.is_empty() => Some((leaf.keys.remove(0), None)),
            Node::Internal(_) | Node::Leaf(_) => None,
        }
    }

    /// Prepends a key, and a child when this node is internal.
    pub(crate) fn push_front(&mut self, key: Key, child: Option<Handle>) {
        match self {
            Node::Internal(internal) => {
                internal.keys.insert(0, key);
                if let Some(child) = child {
                    internal.children.insert(0, child);
                }
            }
            Node::Leaf(leaf) => leaf.keys.insert(0, key),
        }
    }

    /// Appends a key, and a child when this node is internal.
    pub(crate) fn push_back(&mut self, key: Key, child: Option<Handle>) {
        match self {
            Node::Internal(internal) => {
                internal.keys.push(key);
                internal.children.extend(child);
            }
            Node::Leaf(leaf) => leaf.keys.push(key),
        }
    }

    /// Absorbs `right` with `separator` between the two key runs (B-tree merge, and B+tree internal
    /// merge).
    pub(crate) fn merge_with_separator(&mut self, separator: Key, right: Node) {
        match (self, right) {
            (Node::Internal(left), Node::Internal(right)) => left.merge_with_right(separator, right),
            (Node::Leaf(left), Node::Leaf(mut right)) => {
                left.keys.push(separator);
                left.keys.append(&mut right.keys);
            }
            _ => panic!("`Node::merge_with_separator()` - merged siblings must be on the same level"),
        }
    }

    /// Splits around the middle key, which is removed from both halves and returned with the new
    /// right node.
    pub(crate) fn split_around_median(&mut self) -> (Key, Node) {
        match self {
            Node::Internal(internal) => {
                let (median, right) = internal.split();
                (median, Node::Internal(right))
            }
            Node::Leaf(leaf) => {
                let mid = leaf.keys.len() / 2;
                let mut right = LeafNode::new();
                right.keys = leaf.keys.drain(mid + 1..).collect();
                let median = leaf.keys.pop().expect("`Node::split_around_median()` - empty leaf");
                (median, Node::Leaf(right))
            }
        }
    }
}

impl InternalNode {
    /// Creates a root over two children separated by `key`.
    pub(crate) fn with_children(left: Handle, key: Key, right: Handle) -> Self {
        let mut node = Self {
            keys: SmallVec::new(),
            children: SmallVec::new(),
        };
        node.keys.push(key);
        node.children.push(left);
        node.children.push(right);
        node
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn keys(&self) -> &[Key] {
        &self.keys
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> Key {
        self.keys[index]
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Handle {
        self.children[index]
    }

    pub(crate) fn children(&self) -> &[Handle] {
        &self.children
    }

    /// Index of the child a B+tree search for `key` descends into: the first child whose
    /// routing key is `>= key`, else the last child.
    #[inline]
    pub(crate) fn route(&self, key: Key) -> usize {
        match search(&self.keys, key) {
            SearchResult::Found(idx) | SearchResult::NotFound(idx) => idx,
        }
    }

    /// Inserts `key` at `index` with `child` to its right.
    pub(crate) fn insert_child(&mut self, index: usize, key: Key, child: Handle) {
        self.keys.insert(index, key);
        self.children.insert(index + 1, child);
    }

    /// Removes the key at `index` and the child to its right.
    pub(crate) fn remove_child(&mut self, index: usize) -> (Key, Handle) {
        let key = self.keys.remove(index);
        let child = self.children.remove(index + 1);
        (key, child)
    }

    pub(crate) fn set_key(&mut self, index: usize, key: Key) {
        self.keys[index] = key;
    }

    /// Moves the keys and children right of the middle key into a new node and pops the middle key.
    pub(crate) fn split(&mut self) -> (Key, InternalNode) {
        let mid = self.keys.len() / 2;

        let right = InternalNode {
            keys: self.keys.drain(mid + 1..).collect(),
            children: self.children.drain(mid + 1..).collect(),
        };

        let median = self.keys.pop().expect("`InternalNode::split()` - empty node");
        (median, right)
    }

    /// Appends `separator` then everything `right` holds.
    pub(crate) fn merge_with_right(&mut self, separator: Key, mut right: InternalNode) {
        self.keys.push(separator);
        self.keys.append(&mut right.keys);
        self.children.append(&mut right.children);
    }
}

impl LeafNode {
    pub(crate) fn new() -> Self {
        Self {
            next: None,
            keys: SmallVec::new(),
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub(crate) fn last_key(&self) -> Option<Key> {
        self.keys.last().copied()
    }

    pub(crate) fn next(&self) -> Option<Handle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<Handle>) {
        self.next = next;
    }

    pub(crate) fn search(&self, key: Key) -> SearchResult {
        search(&self.keys, key)
    }

    pub(crate) fn insert(&mut self, index: usize, key: Key) {
        self.keys.insert(index, key);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Key {
        self.keys.remove(index)
    }

    /// B+tree leaf split: the right half moves to a new leaf and the left half's largest key is
    /// returned as the routing copy for the parent. The caller links the new leaf into the chain.
    pub(crate) fn split_copying_max(&mut self) -> (Key, LeafNode) {
        let mid = self.keys.len() / 2;

        let mut right = LeafNode::new();
        right.keys = self.keys.drain(mid..).collect();

        let split_key = self.last_key().expect("`LeafNode::split_copying_max()` - empty left half");
        (split_key, right)
    }

    /// B+tree leaf merge: appends `right`'s keys and takes over its place in the chain.
    pub(crate) fn merge_with_right(&mut self, mut right: LeafNode) {
        self.keys.append(&mut right.keys);
        self.next = right.next;
    }

    pub(crate) fn to_vec(&self) -> Vec<Key> {
        self.keys.to_vec()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec;

    fn leaf(keys: &[Key]) -> LeafNode {
        let mut leaf = LeafNode::new();
        for (i, &k) in keys.iter().enumerate() {
            leaf.insert(i, k);
        }
        leaf
    }

    #[test]
    fn b_tree_leaf_split_removes_median() {
        let mut node = Node::Leaf(leaf(&[10, 20, 30]));
        let (median, right) = node.split_around_median();

        assert_eq!(median, 20);
        assert_eq!(node.keys(), &[10]);
        assert_eq!(right.keys(), &[30]);
    }

    #[test]
    fn b_plus_leaf_split_copies_left_max() {
        let mut left = leaf(&[10, 20, 30, 40]);
        let (split_key, right) = left.split_copying_max();

        assert_eq!(split_key, 20);
        assert_eq!(left.to_vec(), vec![10, 20]);
        assert_eq!(right.to_vec(), vec![30, 40]);
    }

    #[test]
    fn internal_split_and_merge_restore_layout() {
        let h = Handle::at;
        let mut node = InternalNode::with_children(h(0), 10, h(1));
        node.insert_child(1, 20, h(2));
        node.insert_child(2, 30, h(3));

        let (median, right) = node.split();
        assert_eq!(median, 20);
        assert_eq!((node.key_count(), node.child_count()), (1, 2));
        assert_eq!((right.key_count(), right.child_count()), (1, 2));

        node.merge_with_right(median, right);
        assert_eq!(node.children(), &[h(0), h(1), h(2), h(3)]);
        assert_eq!(node.route(20), 1);
        assert_eq!(node.route(25), 2);
        assert_eq!(node.route(99), 3);
    }

    #[test]
    fn push_and_pop_move_children_with_keys() {
        let h = Handle::at;
        let mut node = Node::Internal(InternalNode::with_children(h(0), 10, h(1)));

        node.push_front(5, Some(h(2)));
        assert_eq!(node.as_internal().children(), &[h(2), h(0), h(1)]);
        assert_eq!(node.pop_back(), Some((10, Some(h(1)))));
        assert_eq!(node.pop_front(), Some((5, Some(h(2)))));
        assert!(node.pop_front().is_none());
    }

    #[test]
    fn into_leaf_keeps_keys_and_link() {
        let mut detached = leaf(&[3, 4]);
        detached.set_next(Some(Handle::at(9)));
        let unwrapped = Node::Leaf(detached).into_leaf();

        assert_eq!(unwrapped.to_vec(), vec![3, 4]);
        assert_eq!(unwrapped.next(), Some(Handle::at(9)));
    }

    #[test]
    #[should_panic(expected = "`Node::into_leaf()` - handle points at an internal node, not a leaf")]
    fn into_leaf_rejects_internal_node() {
        let h = Handle::at;
        let _ = Node::Internal(InternalNode::with_children(h(0), 10, h(1))).into_leaf();
    }
}
