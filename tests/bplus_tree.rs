use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tree_trace::{BPlusTree, MultiwaySnapshot, Order, StepKind};

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

/// Collects B+tree invariant violations. Returns the largest key under `node` alongside.
fn walk(
    node: &MultiwaySnapshot,
    order: Order,
    depth: usize,
    leaf_depth: &mut Option<usize>,
    errors: &mut Vec<String>,
) -> Option<i64> {
    let keys = node.keys();
    if node.is_leaf() {
        if depth > 0 && (keys.len() < order.min_leaf_keys() || keys.len() > order.max_leaf_keys()) {
            errors.push(format!("leaf {keys:?} holds {} keys", keys.len()));
        }
        if *leaf_depth.get_or_insert(depth) != depth {
            errors.push(format!("leaf {keys:?} at depth {depth}"));
        }
        return keys.last().copied();
    }

    if depth > 0 && (keys.len() < order.min_keys() || keys.len() > order.max_keys()) {
        errors.push(format!("internal {keys:?} holds {} keys", keys.len()));
    }
    if node.children().len() != keys.len() + 1 {
        errors.push(format!("internal {keys:?} has {} children", node.children().len()));
    }
    let mut largest = None;
    for (i, child) in node.children().iter().enumerate() {
        largest = walk(child, order, depth + 1, leaf_depth, errors);
        if let Some(&key) = keys.get(i)
            && largest != Some(key)
        {
            errors.push(format!("routing key {key} but child {i} tops out at {largest:?}"));
        }
    }
    largest
}

fn validate(tree: &BPlusTree) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(root) = tree.snapshot() else {
        if !tree.leaf_chain().is_empty() {
            errors.push("empty tree with a leaf chain".to_owned());
        }
        return errors;
    };

    walk(&root, tree.order(), 0, &mut None, &mut errors);
    let chained: Vec<i64> = tree.leaf_chain().concat();
    if chained != root.leaf_keys() {
        errors.push(format!("leaf chain {chained:?} != leaves {:?}", root.leaf_keys()));
    }
    if chained.windows(2).any(|w| w[0] >= w[1]) {
        errors.push(format!("leaf chain {chained:?} not strictly ascending"));
    }
    errors
}

fn tree_of(order: usize, keys: impl IntoIterator<Item = i64>) -> BPlusTree {
    let mut tree = BPlusTree::new(Order::new(order).unwrap());
    for key in keys {
        tree.insert(key);
    }
    tree
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn order_three_leaves_are_chained() {
    let tree = tree_of(3, [10, 20, 30, 40]);

    assert_eq!(tree.to_vec(), vec![10, 20, 30, 40]);
    assert_eq!(tree.leaf_chain(), vec![vec![10, 20], vec![30, 40]]);
    let root = tree.snapshot().unwrap();
    assert_eq!(root.keys(), &[20]);
    // 20 is a routing copy: it still lives in the left leaf.
    assert_eq!(root.children()[0].keys(), &[10, 20]);
    assert_eq!(validate(&tree), Vec::<String>::new());
}

#[test]
fn internal_split_promotes_median() {
    let mut tree = tree_of(3, [10, 20, 30, 40, 50, 60, 70]);
    assert_eq!(validate(&tree), Vec::<String>::new());

    let steps = tree.insert(80);
    assert!(steps.iter().any(|s| s.description().starts_with("Internal node")));
    assert_eq!(tree.snapshot().unwrap().depth(), 3);
    assert_eq!(validate(&tree), Vec::<String>::new());
}

#[test]
fn deleting_everything_empties_chain() {
    let mut tree = tree_of(4, 1..=30);
    for key in (1..=30).rev() {
        let steps = tree.delete(key);
        assert_eq!(steps.last().map(|s| s.kind()), Some(StepKind::Complete));
        assert_eq!(validate(&tree), Vec::<String>::new(), "after deleting {key}");
    }
    assert!(tree.is_empty());
    assert!(tree.leaf_chain().is_empty());
}

#[test]
fn absent_delete_leaves_tree_alone() {
    let mut tree = tree_of(3, [10, 20, 30, 40]);
    let before = tree.snapshot();
    let steps = tree.delete(25);

    assert!(steps.iter().any(|s| s.description() == "25 not found"));
    assert_eq!(tree.snapshot(), before);
}

// ─── Randomized command sequences ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Replays a random sequence of inserts and deletes against a `BTreeSet` for a random order and
    /// checks fill bounds, routing keys and the leaf chain after every call.
    #[test]
    fn commands_match_btreeset(
        order in order_strategy(),
        ops in proptest::collection::vec(tree_op_strategy(), TEST_SIZE),
    ) {
        let mut tree = BPlusTree::new(order);
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

            prop_assert_eq!(steps.last().and_then(|s| s.tree()).cloned(), tree.snapshot());
            prop_assert_eq!(tree.to_vec(), model.iter().copied().collect::<Vec<_>>());
            prop_assert_eq!(tree.len(), model.len());
            let errors = validate(&tree);
            prop_assert!(errors.is_empty(), "{:?}", errors);
        }
    }

    /// No recorded snapshot shows a non-root node without keys.
    #[test]
    fn no_step_shows_empty_non_root_node(
        order in order_strategy(),
        ops in proptest::collection::vec(tree_op_strategy(), 0..TEST_SIZE / 2),
    ) {
        let mut tree = BPlusTree::new(order);
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

    #[test]
    fn contains_matches_model(keys in proptest::collection::btree_set(value_strategy(), 0..TEST_SIZE)) {
        let tree = tree_of(5, keys.iter().copied());
        for key in -160i64..160 {
            prop_assert_eq!(tree.contains(key), keys.contains(&key));
        }
    }
}
