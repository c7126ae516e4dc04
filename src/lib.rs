//! Step-traced search trees for replaying structural changes.
//!
//! This crate provides four independent ordered-key engines, [`Bst`], [`AvlTree`], [`BTree`] and
//! [`BPlusTree`]. Every `insert` and `delete` returns a [`StepLog`]: the ordered list of atomic
//! transitions the call performed (comparisons, node creation, rotations, splits, borrows, merges),
//! each carrying an independent snapshot of the whole tree at that instant.
//!
//! # Example
//!
//! ```
//! use tree_trace::{AvlTree, StepKind};
//!
//! let mut tree = AvlTree::new();
//! tree.insert(10);
//! tree.insert(20);
//! let steps = tree.insert(30);
//!
//! // The first step names the operation, the last holds the final tree.
//! assert_eq!(steps.first().map(|s| s.description()), Some("Insert 30"));
//! assert_eq!(steps.last().map(|s| s.kind()), Some(StepKind::Complete));
//!
//! // Inserting 30 unbalanced the root, so a rotation was recorded.
//! let rotations: Vec<_> = steps.iter().filter(|s| s.kind() == StepKind::Rotate).collect();
//! assert_eq!(rotations[0].description(), "RR imbalance at 10 (balance -2)");
//!
//! // Earlier snapshots are unaffected by later mutation.
//! let before = steps[0].tree().unwrap();
//! assert_eq!(before.value(), 10);
//! assert_eq!(tree.snapshot().unwrap().value(), 20);
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`
//! - **Replayable** - Snapshots never alias the live tree, so logs can be kept and inspected freely
//! - **Uniform dispatch** - [`AnyTree`] runs any family from a [`TreeConfig`] and plain [`Command`]s
//! - **Serializable** - Steps and snapshots implement `serde::Serialize` for a playback layer
//!
//! # Implementation
//!
//! Nodes live in an arena and are addressed by compact handles. Binary trees relink subtrees through
//! their parent slot as soon as a mutation happens, and multiway trees carry an explicit descent
//! path for splits and underflow repair, so a snapshot taken mid-operation always shows the whole
//! tree.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod command;
mod error;
mod order;
mod raw;

pub mod avl;
pub mod bplus_tree;
pub mod bst;
pub mod btree;
pub mod snapshot;
pub mod step;

/// Key type stored by every engine.
pub type Key = i64;

pub use avl::AvlTree;
pub use bplus_tree::BPlusTree;
pub use bst::Bst;
pub use btree::BTree;
pub use command::{AnyTree, Command, TreeConfig, TreeKind};
pub use error::ConfigError;
pub use order::Order;
pub use snapshot::{BinarySnapshot, MultiwaySnapshot, TreeSnapshot};
pub use step::{OperationStep, StepKind, StepLog};
