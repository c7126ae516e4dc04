//! Errors raised at the construction boundary.
//!
//! The engines themselves never fail: duplicate inserts and deletes of absent keys are reported as
//! steps. Only building a tree from an invalid configuration is rejected.

use thiserror::Error;

/// Invalid tree configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("tree order must be at least {min}, got {order}")]
    OrderTooSmall { order: usize, min: usize },
}
