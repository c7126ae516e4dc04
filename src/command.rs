//! Uniform access to the four engines, driven by plain insert/delete commands.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::avl::AvlTree;
use crate::bplus_tree::BPlusTree;
use crate::bst::Bst;
use crate::btree::BTree;
use crate::order::Order;
use crate::snapshot::TreeSnapshot;
use crate::step::StepLog;
use crate::{ConfigError, Key};

/// A single mutation, as issued by a playback driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum Command {
    Insert(Key),
    Delete(Key),
}

impl Command {
    pub const fn key(self) -> Key {
        match self {
            Command::Insert(key) | Command::Delete(key) => key,
        }
    }
}

/// Which tree family an [`AnyTree`] runs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    #[default]
    Bst,
    Avl,
    BTree,
    BPlusTree,
}

impl TreeKind {
    /// `true` for the families whose shape depends on an [`Order`].
    pub const fn is_multiway(self) -> bool {
        matches!(self, TreeKind::BTree | TreeKind::BPlusTree)
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TreeKind::Bst => "BST",
            TreeKind::Avl => "AVL",
            TreeKind::BTree => "B-tree",
            TreeKind::BPlusTree => "B+tree",
        })
    }
}

/// Construction parameters for an [`AnyTree`].
///
/// `order` is validated only for the multiway families; binary trees ignore it.
///
/// # Examples
///
/// ```
/// use tree_trace::{ConfigError, TreeConfig, TreeKind};
///
/// let tree = TreeConfig { kind: TreeKind::BTree, order: 4 }.build().unwrap();
/// assert_eq!(tree.kind(), TreeKind::BTree);
///
/// let err = TreeConfig { kind: TreeKind::BPlusTree, order: 2 }.build().err();
/// assert_eq!(err, Some(ConfigError::OrderTooSmall { order: 2, min: 3 }));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    pub kind: TreeKind,
    pub order: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            kind: TreeKind::default(),
            order: Order::MIN,
        }
    }
}

impl TreeConfig {
    /// Builds an empty tree, rejecting an order below [`Order::MIN`] for multiway kinds.
    pub fn build(self) -> Result<AnyTree, ConfigError> {
        let tree = match self.kind {
            TreeKind::Bst => AnyTree::Bst(Bst::new()),
            TreeKind::Avl => AnyTree::Avl(AvlTree::new()),
            TreeKind::BTree => AnyTree::BTree(BTree::new(Order::new(self.order)?)),
            TreeKind::BPlusTree => AnyTree::BPlusTree(BPlusTree::new(Order::new(self.order)?)),
        };
        tracing::debug!(kind = %self.kind, order = self.order, "built tree");
        Ok(tree)
    }
}

/// One engine of any family behind a single interface, with snapshots lifted to [`TreeSnapshot`].
///
/// # Examples
///
/// ```
/// use tree_trace::{Command, StepKind, TreeConfig, TreeKind};
///
/// let mut tree = TreeConfig { kind: TreeKind::Avl, order: 3 }.build().unwrap();
/// let logs = tree.replay([Command::Insert(10), Command::Insert(20), Command::Insert(30)]);
///
/// assert_eq!(logs.len(), 3);
/// assert!(logs[2].iter().any(|s| s.kind() == StepKind::Rotate));
/// assert_eq!(tree.to_vec(), [10, 20, 30]);
/// ```
pub enum AnyTree {
    Bst(Bst),
    Avl(AvlTree),
    BTree(BTree),
    BPlusTree(BPlusTree),
}

/// Converts a log to [`TreeSnapshot`]s, converting each shared snapshot once.
fn lift<S: Clone + Into<TreeSnapshot>>(steps: StepLog<S>) -> StepLog<TreeSnapshot> {
    let mut last: Option<(Arc<S>, Arc<TreeSnapshot>)> = None;
    steps
        .into_iter()
        .map(|step| {
            step.map_shared(|tree| match &last {
                Some((from, to)) if Arc::ptr_eq(from, &tree) => Arc::clone(to),
                _ => {
                    let to = Arc::new(S::clone(&tree).into());
                    last = Some((tree, Arc::clone(&to)));
                    to
                }
            })
        })
        .collect()
}

impl AnyTree {
    pub const fn kind(&self) -> TreeKind {
        match self {
            AnyTree::Bst(_) => TreeKind::Bst,
            AnyTree::Avl(_) => TreeKind::Avl,
            AnyTree::BTree(_) => TreeKind::BTree,
            AnyTree::BPlusTree(_) => TreeKind::BPlusTree,
        }
    }

    /// Runs one command and returns its steps.
    pub fn apply(&mut self, command: Command) -> StepLog<TreeSnapshot> {
        match (self, command) {
            (AnyTree::Bst(tree), Command::Insert(key)) => lift(tree.insert(key)),
            (AnyTree::Bst(tree), Command::Delete(key)) => lift(tree.delete(key)),
            (AnyTree::Avl(tree), Command::Insert(key)) => lift(tree.insert(key)),
            (AnyTree::Avl(tree), Command::Delete(key)) => lift(tree.delete(key)),
            (AnyTree::BTree(tree), Command::Insert(key)) => lift(tree.insert(key)),
            (AnyTree::BTree(tree), Command::Delete(key)) => lift(tree.delete(key)),
            (AnyTree::BPlusTree(tree), Command::Insert(key)) => lift(tree.insert(key)),
            (AnyTree::BPlusTree(tree), Command::Delete(key)) => lift(tree.delete(key)),
        }
    }

    pub fn insert(&mut self, key: Key) -> StepLog<TreeSnapshot> {
        self.apply(Command::Insert(key))
    }

    pub fn delete(&mut self, key: Key) -> StepLog<TreeSnapshot> {
        self.apply(Command::Delete(key))
    }

    /// Applies `commands` in order, returning one log per command.
    pub fn replay(&mut self, commands: impl IntoIterator<Item = Command>) -> Vec<StepLog<TreeSnapshot>> {
        commands.into_iter().map(|command| self.apply(command)).collect()
    }

    /// Ascending readout: in-order for binary trees and B-trees, the leaf chain for B+trees.
    pub fn to_vec(&self) -> Vec<Key> {
        match self {
            AnyTree::Bst(tree) => tree.to_vec(),
            AnyTree::Avl(tree) => tree.to_vec(),
            AnyTree::BTree(tree) => tree.to_vec(),
            AnyTree::BPlusTree(tree) => tree.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnyTree::Bst(tree) => tree.len(),
            AnyTree::Avl(tree) => tree.len(),
            AnyTree::BTree(tree) => tree.len(),
            AnyTree::BPlusTree(tree) => tree.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: Key) -> bool {
        match self {
            AnyTree::Bst(tree) => tree.contains(key),
            AnyTree::Avl(tree) => tree.contains(key),
            AnyTree::BTree(tree) => tree.contains(key),
            AnyTree::BPlusTree(tree) => tree.contains(key),
        }
    }

    pub fn snapshot(&self) -> Option<TreeSnapshot> {
        match self {
            AnyTree::Bst(tree) => tree.snapshot().map(Into::into),
            AnyTree::Avl(tree) => tree.snapshot().map(Into::into),
            AnyTree::BTree(tree) => tree.snapshot().map(Into::into),
            AnyTree::BPlusTree(tree) => tree.snapshot().map(Into::into),
        }
    }
}

impl From<Bst> for AnyTree {
    fn from(tree: Bst) -> Self {
        AnyTree::Bst(tree)
    }
}

impl From<AvlTree> for AnyTree {
    fn from(tree: AvlTree) -> Self {
        AnyTree::Avl(tree)
    }
}

impl From<BTree> for AnyTree {
    fn from(tree: BTree) -> Self {
        AnyTree::BTree(tree)
    }
}

impl From<BPlusTree> for AnyTree {
    fn from(tree: BPlusTree) -> Self {
        AnyTree::BPlusTree(tree)
    }
}
