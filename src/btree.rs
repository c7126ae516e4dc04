//! B-tree of a fixed order with a step trace.

use alloc::format;
use alloc::vec::Vec;

use crate::Key;
use crate::order::Order;
use crate::raw::{Handle, Node, Path, PathElement, RawMultiwayTree, SearchResult, Sibling};
use crate::snapshot::MultiwaySnapshot;
use crate::step::{StepDraft, StepKind, StepLog, StepRecorder};

/// A B-tree of order `m` that records every descent, split, borrow and merge it performs.
///
/// Every node holds at most `m - 1` keys and every node except the root at least `⌈m/2⌉ - 1`.
/// Keys live in internal nodes as well as leaves. Deleting an internal key replaces it with its
/// successor, so removal always happens at a leaf.
///
/// # Examples
///
/// ```
/// use tree_trace::{BTree, Order, StepKind};
///
/// let mut tree = BTree::new(Order::new(3).unwrap());
/// for key in [10, 20, 30, 40] {
///     tree.insert(key);
/// }
///
/// let root = tree.snapshot().unwrap();
/// assert_eq!(root.keys(), [20]);
/// assert_eq!(root.children()[0].keys(), [10]);
/// assert_eq!(root.children()[1].keys(), [30, 40]);
///
/// let steps = tree.delete(10);
/// assert!(steps.iter().any(|s| s.kind() == StepKind::Rotate));
/// assert_eq!(tree.to_vec(), [20, 30, 40]);
/// ```
pub struct BTree {
    order: Order,
    raw: RawMultiwayTree,
    log: StepRecorder<MultiwaySnapshot>,
}

impl BTree {
    pub const fn new(order: Order) -> Self {
        Self {
            order,
            raw: RawMultiwayTree::new(),
            log: StepRecorder::new(),
        }
    }

    pub const fn order(&self) -> Order {
        self.order
    }

    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    pub fn contains(&self, key: Key) -> bool {
        let mut current = self.raw.root();
        while let Some(handle) = current {
            let node = self.raw.node(handle);
            current = match (node.search(key), node) {
                (SearchResult::Found(_), _) => return true,
                (SearchResult::NotFound(_), Node::Leaf(_)) => None,
                (SearchResult::NotFound(index), Node::Internal(internal)) => Some(internal.child(index)),
            };
        }
        false
    }

    /// Keys in ascending order, interleaving internal keys with their subtrees.
    pub fn to_vec(&self) -> Vec<Key> {
        self.raw.in_order()
    }

    /// Independent copy of the current tree.
    pub fn snapshot(&self) -> Option<MultiwaySnapshot> {
        self.raw.snapshot()
    }

    /// Inserts `key`, splitting overflowing nodes on the way back up, and returns the steps taken.
    pub fn insert(&mut self, key: Key) -> StepLog<MultiwaySnapshot> {
        tracing::debug!(key, order = self.order.get(), "b-tree insert");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Insert {key}")).keys([key]));
        self.insert_key(key);
        self.record(StepDraft::complete(format!("Insert of {key} complete")));
        self.log.finish()
    }

    /// Deletes `key`, repairing underflowing nodes on the way back up, and returns the steps taken.
    pub fn delete(&mut self, key: Key) -> StepLog<MultiwaySnapshot> {
        tracing::debug!(key, order = self.order.get(), "b-tree delete");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Delete {key}")).keys([key]));
        self.delete_key(key);
        self.record(StepDraft::complete(format!("Delete of {key} complete")));
        self.log.finish()
    }

    fn record(&mut self, draft: StepDraft) {
        self.log.record(draft, self.raw.revision(), || self.raw.snapshot());
    }

    // ─── Insert ──────────────────────────────────────────────────────────────

    fn insert_key(&mut self, key: Key) {
        let Some(mut current) = self.raw.root() else {
            self.record(StepDraft::create("Create an empty root leaf", key));
            self.raw.plant(key);
            self.record(StepDraft::insert(format!("Placed {key} in the root")).keys([key]));
            return;
        };

        let mut path = Path::new();
        let index = loop {
            let node = self.raw.node(current);
            match node.search(key) {
                SearchResult::Found(_) => {
                    self.record(StepDraft::highlight(format!("{key} already exists")).keys([key]));
                    return;
                }
                SearchResult::NotFound(index) => match node {
                    Node::Leaf(_) => break index,
                    Node::Internal(internal) => {
                        let child = internal.child(index);
                        let draft = descend(internal.keys(), key, index);
                        path.push(PathElement {
                            node: current,
                            child_index: index,
                        });
                        self.record(draft);
                        current = child;
                    }
                },
            }
        };

        self.raw.node_mut(current).as_leaf_mut().insert(index, key);
        self.raw.note_inserted();
        self.record(StepDraft::insert(format!("Insert {key} into the leaf")).keys([key]));
        self.split_overflowing(current, path);
    }

    /// Splits `node` and each ancestor that overflows in turn.
    fn split_overflowing(&mut self, mut node: Handle, mut path: Path) {
        let max = self.order.max_keys();
        while self.raw.node(node).key_count() > max {
            let keys = self.raw.node(node).keys().to_vec();
            self.record(
                StepDraft::split(format!("{keys:?} has more than {max} keys, split around the median"))
                    .overflow(keys.iter().copied()),
            );

            let (median, right) = self.raw.node_mut(node).split_around_median();
            let right = self.raw.alloc(right);
            tracing::trace!(median, "b-tree split");

            let Some(PathElement {
                node: parent,
                child_index,
            }) = path.pop()
            else {
                self.raw.grow_root(node, median, right);
                self.record(StepDraft::split(format!("Moved {median} up into a new root")).keys([median]));
                return;
            };
            self.raw.node_mut(parent).as_internal_mut().insert_child(child_index, median, right);
            self.record(StepDraft::split(format!("Moved {median} up into the parent")).keys([median]));
            node = parent;
        }
    }

    // ─── Delete ──────────────────────────────────────────────────────────────

    fn delete_key(&mut self, key: Key) {
        let Some(mut current) = self.raw.root() else {
            self.record(StepDraft::highlight(format!("{key} not found")));
            return;
        };

        let mut path = Path::new();
        let index = loop {
            let node = self.raw.node(current);
            match node.search(key) {
                SearchResult::Found(index) => break index,
                SearchResult::NotFound(index) => match node {
                    Node::Leaf(_) => {
                        self.record(StepDraft::highlight(format!("{key} not found")));
                        return;
                    }
                    Node::Internal(internal) => {
                        let child = internal.child(index);
                        let draft = descend(internal.keys(), key, index);
                        path.push(PathElement {
                            node: current,
                            child_index: index,
                        });
                        self.record(draft);
                        current = child;
                    }
                },
            }
        };
        self.record(StepDraft::highlight(format!("Found {key}")).keys([key]));

        let (leaf, index) = if self.raw.node(current).is_leaf() {
            (current, index)
        } else {
            self.replace_with_successor(current, index, &mut path)
        };

        let removed = self.raw.node(leaf).keys()[index];
        self.record(StepDraft::delete(format!("Remove {removed} from the leaf")).keys([removed]));
        self.raw.node_mut(leaf).as_leaf_mut().remove(index);
        if self.raw.note_removed() {
            self.record(StepDraft::delete("The tree is now empty"));
            return;
        }
        self.repair_underflow(leaf, path);
    }

    /// Overwrites the internal key at `index` with its successor and returns where that successor
    /// sits in its leaf. `path` is extended down to that leaf.
    fn replace_with_successor(&mut self, node: Handle, index: usize, path: &mut Path) -> (Handle, usize) {
        let internal = self.raw.node(node).as_internal();
        let key = internal.key(index);
        let mut current = internal.child(index + 1);
        path.push(PathElement {
            node,
            child_index: index + 1,
        });
        while let Node::Internal(internal) = self.raw.node(current) {
            path.push(PathElement {
                node: current,
                child_index: 0,
            });
            current = internal.child(0);
        }

        let successor = self.raw.node(current).keys()[0];
        self.record(
            StepDraft::highlight(format!("{key} is in an internal node, its successor is {successor}"))
                .keys([key, successor]),
        );
        self.raw.node_mut(node).as_internal_mut().set_key(index, successor);
        self.record(StepDraft::highlight(format!("Replace {key} with {successor}")).keys([successor]));
        (current, 0)
    }

    /// Borrows or merges upward from `node` until no node on `path` underflows, then collapses an
    /// emptied root.
    fn repair_underflow(&mut self, mut node: Handle, mut path: Path) {
        let min = self.order.min_keys();
        let mut carried: Option<StepDraft> = None;

        while let Some(PathElement {
            node: parent,
            child_index,
        }) = path.pop()
        {
            if self.raw.node(node).key_count() >= min {
                break;
            }
            let Some(sibling) = self.raw.best_sibling(parent, child_index) else {
                break;
            };

            let draft = match sibling {
                Sibling::Left(left) if self.raw.node(left).key_count() > min => {
                    self.borrow_from_left(parent, child_index, left, node)
                }
                Sibling::Right(right) if self.raw.node(right).key_count() > min => {
                    self.borrow_from_right(parent, child_index, node, right)
                }
                Sibling::Left(left) => self.merge(parent, child_index - 1, left, node),
                Sibling::Right(right) => self.merge(parent, child_index, node, right),
            };
            let draft = match carried.take() {
                Some(earlier) => draft.after(earlier),
                None => draft,
            };

            // A non-root parent left without keys is fixed on the next pass; show both together.
            if draft.kind() == StepKind::Merge && self.raw.node(parent).key_count() == 0 && !path.is_empty() {
                carried = Some(draft);
            } else {
                self.record(draft);
            }
            node = parent;
        }

        if let Some(root) = self.raw.collapse_root() {
            tracing::trace!("b-tree root collapse");
            let keys = self.raw.node(root).keys().to_vec();
            self.record(
                StepDraft::delete(format!("The root has no keys left, {keys:?} becomes the root")).keys(keys),
            );
        }
    }

    fn borrow_from_left(&mut self, parent: Handle, child_index: usize, left: Handle, node: Handle) -> StepDraft {
        let (key, child) = self
            .raw
            .node_mut(left)
            .pop_back()
            .expect("`BTree::borrow_from_left()` - sibling has spare keys");
        let parent = self.raw.node_mut(parent).as_internal_mut();
        let separator = parent.key(child_index - 1);
        parent.set_key(child_index - 1, key);
        self.raw.node_mut(node).push_front(separator, child);

        tracing::trace!(key, separator, "b-tree borrow from left");
        StepDraft::rotate(format!("Borrow from the left sibling: {key} moves up, {separator} moves down"))
            .keys([key, separator])
    }

    fn borrow_from_right(&mut self, parent: Handle, child_index: usize, node: Handle, right: Handle) -> StepDraft {
        let (key, child) = self
            .raw
            .node_mut(right)
            .pop_front()
            .expect("`BTree::borrow_from_right()` - sibling has spare keys");
        let parent = self.raw.node_mut(parent).as_internal_mut();
        let separator = parent.key(child_index);
        parent.set_key(child_index, key);
        self.raw.node_mut(node).push_back(separator, child);

        tracing::trace!(key, separator, "b-tree borrow from right");
        StepDraft::rotate(format!("Borrow from the right sibling: {key} moves up, {separator} moves down"))
            .keys([key, separator])
    }

    /// Merges `right` and the separator at `separator_index` into `left`.
    fn merge(&mut self, parent: Handle, separator_index: usize, left: Handle, right: Handle) -> StepDraft {
        let (separator, removed) = self.raw.node_mut(parent).as_internal_mut().remove_child(separator_index);
        debug_assert_eq!(removed, right);
        let right = self.raw.take(right);
        self.raw.node_mut(left).merge_with_separator(separator, right);

        tracing::trace!(separator, "b-tree merge");
        let keys = self.raw.node(left).keys().to_vec();
        StepDraft::merge(format!("Merge siblings around {separator} into {keys:?}")).keys([separator])
    }
}

/// Highlight for stepping from an internal node into child `index`.
fn descend(keys: &[Key], key: Key, index: usize) -> StepDraft {
    match keys.get(index) {
        Some(&bound) => StepDraft::highlight(format!("{key} < {bound}, descend to child {index}")).keys([bound]),
        None => {
            let bound = keys[index - 1];
            StepDraft::highlight(format!("{key} > {bound}, descend to the last child")).keys([bound])
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;
    use alloc::string::String;
    use alloc::vec;
    use proptest::prelude::*;

    /// Fill bounds, child counts, key order and uniform leaf depth of a snapshot.
    fn check(snapshot: &MultiwaySnapshot, order: Order) -> Vec<String> {
        fn walk(
            node: &MultiwaySnapshot,
            order: Order,
            depth: usize,
            leaf_depth: &mut Option<usize>,
            errors: &mut Vec<String>,
        ) {
            let keys = node.keys();
            if depth > 0 && !(order.min_keys()..=order.max_keys()).contains(&keys.len()) {
                errors.push(format!("node {keys:?} at depth {depth} outside fill bounds"));
            }
            if keys.windows(2).any(|w| w[0] >= w[1]) {
                errors.push(format!("node {keys:?} not strictly ascending"));
            }
            if node.is_leaf() {
                if *leaf_depth.get_or_insert(depth) != depth {
                    errors.push(format!("leaf {keys:?} at depth {depth}"));
                }
                return;
            }
            if node.children().len() != keys.len() + 1 {
                errors.push(format!("node {keys:?} has {} children", node.children().len()));
            }
            for child in node.children() {
                walk(child, order, depth + 1, leaf_depth, errors);
            }
        }

        let mut errors = Vec::new();
        walk(snapshot, order, 0, &mut None, &mut errors);
        let keys = snapshot.in_order();
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            errors.push(format!("in-order readout {keys:?} not strictly ascending"));
        }
        errors
    }

    fn tree_of(order: usize, keys: impl IntoIterator<Item = Key>) -> BTree {
        let mut tree = BTree::new(Order::new(order).unwrap());
        for key in keys {
            tree.insert(key);
        }
        tree
    }

    fn shape(tree: &BTree) -> (Vec<Key>, Vec<Vec<Key>>) {
        let root = tree.snapshot().unwrap();
        let children = root.children().iter().map(|c| c.keys().to_vec()).collect();
        (root.keys().to_vec(), children)
    }

    #[test]
    fn root_split_on_third_key() {
        let mut tree = tree_of(3, [10, 20]);
        let steps = tree.insert(30);

        let split = steps.iter().find(|s| s.kind() == StepKind::Split).unwrap();
        assert_eq!(split.overflow_keys().iter().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(steps.iter().filter(|s| s.kind() == StepKind::Split).count(), 2);

        tree.insert(40);
        assert_eq!(shape(&tree), (vec![20], vec![vec![10], vec![30, 40]]));
    }

    #[test]
    fn split_propagates_to_new_root() {
        let tree = tree_of(3, 1..=7);
        assert_eq!(shape(&tree), (vec![4], vec![vec![2], vec![6]]));
        assert_eq!(tree.snapshot().unwrap().depth(), 3);
    }

    #[test]
    fn duplicate_insert_is_a_highlight() {
        let mut tree = tree_of(3, 1..=7);
        let steps = tree.insert(4);
        assert!(steps.iter().any(|s| s.description() == "4 already exists"));
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn internal_delete_uses_successor() {
        let mut tree = tree_of(3, 1..=7);
        let steps = tree.delete(4);

        assert!(steps.iter().any(|s| s.description() == "Replace 4 with 5"));
        assert_eq!(tree.to_vec(), vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(shape(&tree), (vec![2, 5], vec![vec![1], vec![3], vec![6, 7]]));
    }

    #[test]
    fn borrow_rotates_through_parent() {
        let mut tree = tree_of(3, [10, 20, 30, 40]);
        let steps = tree.delete(10);

        let borrow = steps.iter().find(|s| s.kind() == StepKind::Rotate).unwrap();
        assert_eq!(borrow.description(), "Borrow from the right sibling: 30 moves up, 20 moves down");
        assert_eq!(shape(&tree), (vec![30], vec![vec![20], vec![40]]));
    }

    /// Key counts of every node below the root.
    fn non_root_counts(snapshot: &MultiwaySnapshot) -> Vec<usize> {
        let mut counts = Vec::new();
        let mut stack: Vec<&MultiwaySnapshot> = snapshot.children().iter().collect();
        while let Some(node) = stack.pop() {
            counts.push(node.keys().len());
            stack.extend(node.children());
        }
        counts
    }

    #[test]
    fn cascading_merge_never_shows_empty_non_root() {
        let mut tree = tree_of(3, 1..=7);
        let order = tree.order();

        for key in 1..=4 {
            for step in tree.delete(key) {
                let Some(snapshot) = step.tree() else { continue };
                for count in non_root_counts(snapshot) {
                    assert!(
                        (1..=order.max_keys()).contains(&count),
                        "step {:?} shows a non-root node with {count} keys",
                        step.description()
                    );
                }
            }
            let errors = check(&tree.snapshot().unwrap(), order);
            assert!(errors.is_empty(), "{errors:?}");
        }
        assert_eq!(tree.to_vec(), vec![5, 6, 7]);
    }

    #[test]
    fn emptying_records_delete_step() {
        let mut tree = tree_of(4, [1]);
        let steps = tree.delete(1);
        assert!(steps.iter().any(|s| s.description() == "The tree is now empty" && s.tree().is_none()));
        assert!(tree.is_empty());
        assert!(!tree.contains(1));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn stays_filled_and_sorted(
            order in 3usize..7,
            ops in prop::collection::vec((any::<bool>(), 0i64..80), 0..200),
        ) {
            let mut tree = BTree::new(Order::new(order).unwrap());
            let mut model = BTreeSet::new();

            for (is_insert, key) in ops {
                if is_insert {
                    model.insert(key);
                    tree.insert(key);
                } else {
                    model.remove(&key);
                    tree.delete(key);
                }

                prop_assert_eq!(tree.to_vec(), model.iter().copied().collect::<Vec<_>>());
                prop_assert_eq!(tree.len(), model.len());
                if let Some(snapshot) = tree.snapshot() {
                    let errors = check(&snapshot, tree.order());
                    prop_assert!(errors.is_empty(), "{:?}", errors);
                }
            }
        }
    }
}
