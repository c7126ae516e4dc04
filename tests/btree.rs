use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tree_trace::{BTree, MultiwaySnapshot, Order, StepKind};

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 400;

fn value_strategy() -> impl Strategy<Value = i64> {
    -150i64..150i64
}

fn order_strategy() -> impl Strategy<Value = Order> {
    (3usize..=8).prop_map(|m| Order::new(m).unwrap())
}

// ─── Operations enum for driving randomized tests ────────────────────────────

#[derive(Debug, Clone)]
enum TreeOp {
    Insert(i64),
    Delete(i64),
}

fn tree_op_strategy() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        3 => value_strategy().prop_map(TreeOp::Insert),
        2 => value_strategy().prop_map(TreeOp::Delete),
    ]
}

/// Collects B-tree invariant violations: fill bounds, child counts, key order, leaf depth.
fn violations(root: &MultiwaySnapshot, order: Order) -> Vec<String> {
    fn walk(
        node: &MultiwaySnapshot,
        order: Order,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        errors: &mut Vec<String>,
    ) {
        let keys = node.keys();
        if depth > 0 && (keys.len() < order.min_keys() || keys.len() > order.max_keys()) {
            errors.push(format!("{keys:?} at depth {depth} holds {} keys", keys.len()));
        }
        if node.is_leaf() {
            if *leaf_depth.get_or_insert(depth) != depth {
                errors.push(format!("leaf {keys:?} at depth {depth}"));
            }
        } else {
            if node.children().len() != keys.len() + 1 {
                errors.push(format!("{keys:?} has {} children", node.children().len()));
            }
            for child in node.children() {
                walk(child, order, depth + 1, leaf_depth, errors);
            }
        }
    }

    let mut errors = Vec::new();
    walk(root, order, 0, &mut None, &mut errors);
    let keys = root.in_order();
    if keys.windows(2).any(|w| w[0] >= w[1]) {
        errors.push(format!("in-order {keys:?} not strictly ascending"));
    }
    errors
}

fn tree_of(order: usize, keys: impl IntoIterator<Item = i64>) -> BTree {
    let mut tree = BTree::new(Order::new(order).unwrap());
    for key in keys {
        tree.insert(key);
    }
    tree
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn order_three_root_split() {
    let mut tree = tree_of(3, [10, 20]);
    let steps = tree.insert(30);
    let split = steps.iter().find(|s| s.kind() == StepKind::Split).unwrap();
    assert_eq!(split.overflow_keys().iter().copied().collect::<Vec<_>>(), vec![10, 20, 30]);

    tree.insert(40);
    let root = tree.snapshot().unwrap();
    assert_eq!(root.keys(), &[20]);
    assert_eq!(root.children()[0].keys(), &[10]);
    assert_eq!(root.children()[1].keys(), &[30, 40]);
    assert_eq!(tree.to_vec(), vec![10, 20, 30, 40]);
}

#[test]
fn deleting_smallest_keys_never_exposes_bad_nodes() {
    let order = Order::new(3).unwrap();
    let mut tree = BTree::new(order);
    for key in 1..=7 {
        tree.insert(key);
    }

    for key in 1..=4 {
        for step in tree.delete(key) {
            let Some(root) = step.tree() else { continue };
            let mut stack: Vec<&MultiwaySnapshot> = root.children().iter().collect();
            while let Some(node) = stack.pop() {
                let count = node.keys().len();
                assert!(
                    count > 0 && count <= order.max_keys(),
                    "{:?}: non-root node {:?}",
                    step.description(),
                    node.keys()
                );
                stack.extend(node.children());
            }
        }
        assert_eq!(violations(&tree.snapshot().unwrap(), order), Vec::<String>::new());
    }
    assert_eq!(tree.to_vec(), vec![5, 6, 7]);
}

#[test]
fn absent_delete_reports_not_found() {
    let mut tree = tree_of(4, [1, 2, 3, 4, 5]);
    let steps = tree.delete(9);

    assert!(steps.iter().any(|s| s.description() == "9 not found"));
    assert_eq!(steps.last().map(|s| s.kind()), Some(StepKind::Complete));
    assert_eq!(tree.len(), 5);
}

#[test]
fn empty_tree_delete_is_not_found() {
    let mut tree = tree_of(3, []);
    let steps = tree.delete(1);
    assert_eq!(steps.len(), 3);
    assert!(steps.iter().all(|s| s.tree().is_none()));
}

// ─── Randomized command sequences ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Replays a random sequence of inserts and deletes against a `BTreeSet` for a random order and
    /// checks fill bounds after every call.
    #[test]
    fn commands_match_btreeset(
        order in order_strategy(),
        ops in proptest::collection::vec(tree_op_strategy(), TEST_SIZE),
    ) {
        let mut tree = BTree::new(order);
        let mut model: BTreeSet<i64> = BTreeSet::new();

        for op in &ops {
            let steps = match *op {
                TreeOp::Insert(v) => {
                    model.insert(v);
                    tree.insert(v)
                }
                TreeOp::Delete(v) => {
                    model.remove(&v);
                    tree.delete(v)
                }
            };

            prop_assert_eq!(steps.first().map(|s| s.kind()), Some(StepKind::Highlight));
            prop_assert_eq!(steps.last().and_then(|s| s.tree()).cloned(), tree.snapshot());
            prop_assert_eq!(tree.to_vec(), model.iter().copied().collect::<Vec<_>>());
            if let Some(root) = tree.snapshot() {
                let errors = violations(&root, order);
                prop_assert!(errors.is_empty(), "{:?}", errors);
            }
        }
    }

    /// No recorded snapshot shows a non-root node without keys.
    #[test]
    fn no_step_shows_empty_non_root_node(
        order in order_strategy(),
        ops in proptest::collection::vec(tree_op_strategy(), 0..TEST_SIZE / 2),
    ) {
        let mut tree = BTree::new(order);
        for op in &ops {
            let steps = match *op {
                TreeOp::Insert(v) => tree.insert(v),
                TreeOp::Delete(v) => tree.delete(v),
            };
            for step in &steps {
                let Some(root) = step.tree() else { continue };
                let mut stack: Vec<&MultiwaySnapshot> = root.children().iter().collect();
                while let Some(node) = stack.pop() {
                    prop_assert!(!node.keys().is_empty(), "{}", step.description());
                    stack.extend(node.children());
                }
            }
        }
    }
}
