// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by reactive reads.

use core::fmt;

use crate::id::NodeId;

/// Error returned by the fallible (`try_`) read accessors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReactiveError {
    /// The node was disposed, or the id belongs to a different runtime.
    Disposed(NodeId),
    /// The node was read while it was being evaluated.
    ///
    /// This means a computation depends on itself, directly or through other
    /// computations.
    Cycle(NodeId),
    /// The node holds a value of a different type than the handle claims.
    TypeMismatch(NodeId),
}

impl ReactiveError {
    /// Returns the node the error refers to.
    #[must_use]
    pub fn node(self) -> NodeId {
        match self {
            Self::Disposed(id) | Self::Cycle(id) | Self::TypeMismatch(id) => id,
        }
    }
}

impl fmt::Display for ReactiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed(id) => write!(f, "reactive node {id} has been disposed"),
            Self::Cycle(id) => write!(f, "reactive node {id} was read while evaluating itself"),
            Self::TypeMismatch(id) => {
                write!(f, "reactive node {id} does not hold a value of the requested type")
            }
        }
    }
}

impl core::error::Error for ReactiveError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn display_mentions_node() {
        let err = ReactiveError::Cycle(NodeId::new(4, 0));
        assert_eq!(err.node(), NodeId::new(4, 0));
        assert!(err.to_string().contains("NodeId(4v0)"));
    }
}
