use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Maximum branching factor `m` of a B-tree or B+tree, fixed for the tree's lifetime.
///
/// An `Order` is always at least [`Order::MIN`], so the fill bounds derived from it are well formed.
///
/// # Examples
///
/// ```
/// use tree_trace::Order;
///
/// let order = Order::new(4).unwrap();
/// assert_eq!(order.max_keys(), 3);
/// assert_eq!(order.min_keys(), 1);
/// assert_eq!(order.max_leaf_keys(), 4);
/// assert_eq!(order.min_leaf_keys(), 2);
///
/// assert!(Order::new(2).is_err());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Order(usize);

impl Order {
    /// Smallest supported order (a 2-3 tree).
    pub const MIN: usize = 3;

    pub const fn new(order: usize) -> Result<Self, ConfigError> {
        if order < Self::MIN {
            return Err(ConfigError::OrderTooSmall { order, min: Self::MIN });
        }
        Ok(Self(order))
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// `m - 1`: most keys a B-tree node or a B+tree internal node may hold.
    pub const fn max_keys(self) -> usize {
        self.0 - 1
    }

    /// `⌈m/2⌉ - 1`: fewest keys a non-root B-tree node or B+tree internal node may hold.
    pub const fn min_keys(self) -> usize {
        self.0.div_ceil(2) - 1
    }

    /// `m`: most keys a B+tree leaf may hold.
    pub const fn max_leaf_keys(self) -> usize {
        self.0
    }

    /// `⌈m/2⌉`: fewest keys a non-root B+tree leaf may hold.
    pub const fn min_leaf_keys(self) -> usize {
        self.0.div_ceil(2)
    }
}

impl Default for Order {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<usize> for Order {
    type Error = ConfigError;

    fn try_from(order: usize) -> Result<Self, Self::Error> {
        Self::new(order)
    }
}

impl From<Order> for usize {
    fn from(order: Order) -> Self {
        order.0
    }
}
