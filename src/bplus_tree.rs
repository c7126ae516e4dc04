//! B+tree of a fixed order with chained leaves and a step trace.

use alloc::format;
use alloc::vec::Vec;

use crate::Key;
use crate::order::Order;
use crate::raw::{Handle, Node, Path, PathElement, RawMultiwayTree, SearchResult, Sibling};
use crate::snapshot::MultiwaySnapshot;
use crate::step::{StepDraft, StepKind, StepLog, StepRecorder};

/// A B+tree of order `m` that records every descent, split, borrow and merge it performs.
///
/// Every key lives in exactly one leaf. Leaves hold `⌈m/2⌉..=m` keys and are chained left to right
/// through `next`; internal nodes hold `⌈m/2⌉ - 1..=m - 1` routing keys, where key `i` is a copy of
/// the largest key under child `i`. The root is exempt from the lower bounds.
///
/// # Examples
///
/// ```
/// use tree_trace::{BPlusTree, Order};
///
/// let mut tree = BPlusTree::new(Order::new(3).unwrap());
/// for key in [10, 20, 30, 40] {
///     tree.insert(key);
/// }
///
/// assert_eq!(tree.snapshot().unwrap().keys(), [20]);
/// assert_eq!(tree.leaf_chain(), [vec![10, 20], vec![30, 40]]);
/// assert_eq!(tree.to_vec(), [10, 20, 30, 40]);
/// ```
pub struct BPlusTree {
    order: Order,
    raw: RawMultiwayTree,
    log: StepRecorder<MultiwaySnapshot>,
}

impl BPlusTree {
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
        self.raw.root().is_some_and(|root| {
            let leaf = self.find_leaf(root, key);
            matches!(self.raw.node(leaf).search(key), SearchResult::Found(_))
        })
    }

    /// Keys in ascending order, read by walking the leaf chain.
    pub fn to_vec(&self) -> Vec<Key> {
        self.raw.leaf_chain().into_iter().flatten().collect()
    }

    /// Keys of each leaf, visited by following `next` from the leftmost leaf.
    pub fn leaf_chain(&self) -> Vec<Vec<Key>> {
        self.raw.leaf_chain()
    }

    /// Independent copy of the current tree.
    pub fn snapshot(&self) -> Option<MultiwaySnapshot> {
        self.raw.snapshot()
    }

    /// Inserts `key`, splitting overflowing nodes on the way back up, and returns the steps taken.
    pub fn insert(&mut self, key: Key) -> StepLog<MultiwaySnapshot> {
        tracing::debug!(key, order = self.order.get(), "b+tree insert");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Insert {key}")).keys([key]));
        self.insert_key(key);
        self.record(StepDraft::complete(format!("Insert of {key} complete")));
        self.log.finish()
    }

    /// Deletes `key` from its leaf, repairing underflowing nodes on the way back up, and returns the
    /// steps taken.
    pub fn delete(&mut self, key: Key) -> StepLog<MultiwaySnapshot> {
        tracing::debug!(key, order = self.order.get(), "b+tree delete");
        self.log.begin();
        self.record(StepDraft::highlight(format!("Delete {key}")).keys([key]));
        self.delete_key(key);
        self.record(StepDraft::complete(format!("Delete of {key} complete")));
        self.log.finish()
    }

    fn record(&mut self, draft: StepDraft) {
        self.log.record(draft, self.raw.revision(), || self.raw.snapshot());
    }

    fn find_leaf(&self, mut current: Handle, key: Key) -> Handle {
        while let Node::Internal(internal) = self.raw.node(current) {
            current = internal.child(internal.route(key));
        }
        current
    }

    /// Walks from `current` to the leaf `key` routes to, recording each hop on `path`.
    fn descend(&mut self, mut current: Handle, key: Key, path: &mut Path) -> Handle {
        while let Node::Internal(internal) = self.raw.node(current) {
            let index = internal.route(key);
            let child = internal.child(index);
            let draft = route(internal.keys(), key, index);
            path.push(PathElement {
                node: current,
                child_index: index,
            });
            self.record(draft);
            current = child;
        }
        current
    }

    // ─── Insert ──────────────────────────────────────────────────────────────

    fn insert_key(&mut self, key: Key) {
        let Some(root) = self.raw.root() else {
            self.record(StepDraft::create("Create an empty root leaf", key));
            self.raw.plant(key);
            self.record(StepDraft::insert(format!("Placed {key} in the root")).keys([key]));
            return;
        };

        let mut path = Path::new();
        let leaf = self.descend(root, key, &mut path);
        let index = match self.raw.node(leaf).as_leaf().search(key) {
            SearchResult::Found(_) => {
                self.record(StepDraft::highlight(format!("{key} already exists")).keys([key]));
                return;
            }
            SearchResult::NotFound(index) => index,
        };

        self.raw.node_mut(leaf).as_leaf_mut().insert(index, key);
        self.raw.note_inserted();
        self.record(StepDraft::insert(format!("Insert {key} into the leaf")).keys([key]));
        self.split_overflowing(leaf, path);
    }

    /// Splits `node` and each ancestor that overflows in turn. Leaves copy their left half's largest
    /// key up; internal nodes move their median up.
    fn split_overflowing(&mut self, mut node: Handle, mut path: Path) {
        loop {
            let is_leaf = self.raw.node(node).is_leaf();
            let max = if is_leaf {
                self.order.max_leaf_keys()
            } else {
                self.order.max_keys()
            };
            if self.raw.node(node).key_count() <= max {
                return;
            }

            let keys = self.raw.node(node).keys().to_vec();
            let role = if is_leaf { "Leaf" } else { "Internal node" };
            self.record(
                StepDraft::split(format!("{role} {keys:?} has more than {max} keys, split it"))
                    .overflow(keys.iter().copied()),
            );

            let (separator, right, moved) = if is_leaf {
                let (separator, right) = self.split_leaf(node);
                (separator, right, "Copied")
            } else {
                let (median, right) = self.raw.node_mut(node).split_around_median();
                (median, self.raw.alloc(right), "Moved")
            };
            tracing::trace!(separator, is_leaf, "b+tree split");

            let Some(PathElement {
                node: parent,
                child_index,
            }) = path.pop()
            else {
                self.raw.grow_root(node, separator, right);
                self.record(StepDraft::split(format!("{moved} {separator} up into a new root")).keys([separator]));
                return;
            };
            self.raw.node_mut(parent).as_internal_mut().insert_child(child_index, separator, right);
            self.record(StepDraft::split(format!("{moved} {separator} up into the parent")).keys([separator]));
            node = parent;
        }
    }

    /// Moves the upper half of `leaf` into a new leaf linked right after it.
    fn split_leaf(&mut self, leaf: Handle) -> (Key, Handle) {
        let (separator, right) = self.raw.node_mut(leaf).as_leaf_mut().split_copying_max();
        let right = self.raw.alloc(Node::Leaf(right));

        let left = self.raw.node_mut(leaf).as_leaf_mut();
        let next = left.next();
        left.set_next(Some(right));
        self.raw.node_mut(right).as_leaf_mut().set_next(next);
        (separator, right)
    }

    // ─── Delete ──────────────────────────────────────────────────────────────

    fn delete_key(&mut self, key: Key) {
        let Some(root) = self.raw.root() else {
            self.record(StepDraft::highlight(format!("{key} not found")));
            return;
        };

        let mut path = Path::new();
        let leaf = self.descend(root, key, &mut path);
        let SearchResult::Found(index) = self.raw.node(leaf).as_leaf().search(key) else {
            self.record(StepDraft::highlight(format!("{key} not found")));
            return;
        };
        self.record(StepDraft::highlight(format!("Found {key} in the leaf")).keys([key]));

        self.record(StepDraft::delete(format!("Remove {key} from the leaf")).keys([key]));
        self.raw.node_mut(leaf).as_leaf_mut().remove(index);
        if self.raw.note_removed() {
            self.record(StepDraft::delete("The tree is now empty"));
            return;
        }

        self.refresh_routing_key(key, leaf, &path);
        self.repair_underflow(leaf, path);
    }

    /// If `removed` was its leaf's largest key, the nearest ancestor routing on it now routes on the
    /// leaf's new largest key.
    fn refresh_routing_key(&mut self, removed: Key, leaf: Handle, path: &Path) {
        let Some(largest) = self.raw.node(leaf).as_leaf().last_key() else {
            return;
        };
        // The first ancestor where the path does not take the last child holds the leaf's maximum.
        let Some(&PathElement { node, child_index }) = path
            .iter()
            .rev()
            .find(|element| element.child_index < self.raw.node(element.node).key_count())
        else {
            return;
        };

        let internal = self.raw.node_mut(node).as_internal_mut();
        if internal.key(child_index) == removed {
            internal.set_key(child_index, largest);
            self.record(
                StepDraft::highlight(format!("Routing key {removed} becomes {largest}, the leaf's new maximum"))
                    .keys([largest]),
            );
        }
    }

    /// Borrows or merges upward from `node` until no node on `path` underflows, then collapses an
    /// emptied root.
    fn repair_underflow(&mut self, mut node: Handle, mut path: Path) {
        let mut carried: Option<StepDraft> = None;

        while let Some(PathElement {
            node: parent,
            child_index,
        }) = path.pop()
        {
            let is_leaf = self.raw.node(node).is_leaf();
            let min = if is_leaf {
                self.order.min_leaf_keys()
            } else {
                self.order.min_keys()
            };
            if self.raw.node(node).key_count() >= min {
                break;
            }
            let Some(sibling) = self.raw.best_sibling(parent, child_index) else {
                break;
            };

            let draft = match (sibling, is_leaf) {
                (Sibling::Left(left), true) if self.raw.node(left).key_count() > min => {
                    self.borrow_from_left_leaf(parent, child_index, left, node)
                }
                (Sibling::Right(right), true) if self.raw.node(right).key_count() > min => {
                    self.borrow_from_right_leaf(parent, child_index, node, right)
                }
                (Sibling::Left(left), false) if self.raw.node(left).key_count() > min => {
                    self.borrow_from_left_internal(parent, child_index, left, node)
                }
                (Sibling::Right(right), false) if self.raw.node(right).key_count() > min => {
                    self.borrow_from_right_internal(parent, child_index, node, right)
                }
                (Sibling::Left(left), true) => self.merge_leaves(parent, child_index - 1, left, node),
                (Sibling::Right(right), true) => self.merge_leaves(parent, child_index, node, right),
                (Sibling::Left(left), false) => self.merge_internals(parent, child_index - 1, left, node),
                (Sibling::Right(right), false) => self.merge_internals(parent, child_index, node, right),
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
            tracing::trace!("b+tree root collapse");
            let keys = self.raw.node(root).keys().to_vec();
            self.record(
                StepDraft::delete(format!("The root has no keys left, {keys:?} becomes the root")).keys(keys),
            );
        }
    }

    fn borrow_from_left_leaf(&mut self, parent: Handle, child_index: usize, left: Handle, leaf: Handle) -> StepDraft {
        let sibling = self.raw.node_mut(left).as_leaf_mut();
        let last = sibling.key_count() - 1;
        let key = sibling.remove(last);
        let largest = sibling
            .last_key()
            .expect("`BPlusTree::borrow_from_left_leaf()` - sibling keeps at least one key");
        self.raw.node_mut(leaf).as_leaf_mut().insert(0, key);
        self.raw.node_mut(parent).as_internal_mut().set_key(child_index - 1, largest);

        tracing::trace!(key, "b+tree borrow from left leaf");
        StepDraft::rotate(format!("Borrow {key} from the left leaf, routing key becomes {largest}"))
            .keys([key, largest])
    }

    fn borrow_from_right_leaf(&mut self, parent: Handle, child_index: usize, leaf: Handle, right: Handle) -> StepDraft {
        let key = self.raw.node_mut(right).as_leaf_mut().remove(0);
        let target = self.raw.node_mut(leaf).as_leaf_mut();
        let end = target.key_count();
        target.insert(end, key);
        self.raw.node_mut(parent).as_internal_mut().set_key(child_index, key);

        tracing::trace!(key, "b+tree borrow from right leaf");
        StepDraft::rotate(format!("Borrow {key} from the right leaf, routing key becomes {key}")).keys([key])
    }

    /// Appends `right` to `left`, drops the routing key between them and unlinks `right` from the
    /// chain.
    fn merge_leaves(&mut self, parent: Handle, separator_index: usize, left: Handle, right: Handle) -> StepDraft {
        let (separator, removed) = self.raw.node_mut(parent).as_internal_mut().remove_child(separator_index);
        debug_assert_eq!(removed, right);
        let right = self.raw.take(right).into_leaf();
        let merged = self.raw.node_mut(left).as_leaf_mut();
        merged.merge_with_right(right);

        tracing::trace!(separator, "b+tree merge leaves");
        let keys = merged.to_vec();
        StepDraft::merge(format!("Merge leaves into {keys:?}, dropping routing key {separator}")).keys([separator])
    }

    fn borrow_from_left_internal(
        &mut self,
        parent: Handle,
        child_index: usize,
        left: Handle,
        node: Handle,
    ) -> StepDraft {
        let (key, child) = self
            .raw
            .node_mut(left)
            .pop_back()
            .expect("`BPlusTree::borrow_from_left_internal()` - sibling has spare keys");
        let parent = self.raw.node_mut(parent).as_internal_mut();
        let separator = parent.key(child_index - 1);
        parent.set_key(child_index - 1, key);
        self.raw.node_mut(node).push_front(separator, child);

        tracing::trace!(key, separator, "b+tree borrow from left internal");
        StepDraft::rotate(format!("Borrow from the left sibling: {key} moves up, {separator} moves down"))
            .keys([key, separator])
    }

    fn borrow_from_right_internal(
        &mut self,
        parent: Handle,
        child_index: usize,
        node: Handle,
        right: Handle,
    ) -> StepDraft {
        let (key, child) = self
            .raw
            .node_mut(right)
            .pop_front()
            .expect("`BPlusTree::borrow_from_right_internal()` - sibling has spare keys");
        let parent = self.raw.node_mut(parent).as_internal_mut();
        let separator = parent.key(child_index);
        parent.set_key(child_index, key);
        self.raw.node_mut(node).push_back(separator, child);

        tracing::trace!(key, separator, "b+tree borrow from right internal");
        StepDraft::rotate(format!("Borrow from the right sibling: {key} moves up, {separator} moves down"))
            .keys([key, separator])
    }

    fn merge_internals(&mut self, parent: Handle, separator_index: usize, left: Handle, right: Handle) -> StepDraft {
        let (separator, removed) = self.raw.node_mut(parent).as_internal_mut().remove_child(separator_index);
        debug_assert_eq!(removed, right);
        let right = self.raw.take(right);
        self.raw.node_mut(left).merge_with_separator(separator, right);

        tracing::trace!(separator, "b+tree merge internals");
        let keys = self.raw.node(left).keys().to_vec();
        StepDraft::merge(format!("Merge siblings around {separator} into {keys:?}")).keys([separator])
    }
}

/// Highlight for stepping from an internal node into child `index`.
fn route(keys: &[Key], key: Key, index: usize) -> StepDraft {
    match keys.get(index) {
        Some(&bound) => StepDraft::highlight(format!("{key} <= {bound}, descend to child {index}")).keys([bound]),
        None => {
            let bound = keys[index - 1];
            StepDraft::highlight(format!("{key} > {bound}, descend to the last child")).keys([bound])
        }
    }
}
