mod arena;
mod binary;
mod handle;
mod multiway;
mod node;

pub(crate) use binary::{RawBinaryTree, Side, Slot};
pub(crate) use handle::Handle;
pub(crate) use multiway::{Path, PathElement, RawMultiwayTree, Sibling};
pub(crate) use node::{Node, SearchResult};
