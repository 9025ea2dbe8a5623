//! Error types for sql-lowering

use crate::expressions::{QueryId, SourceId};
use crate::optimizer::Pass;
use std::fmt;
use thiserror::Error;

/// The result type for sql-lowering operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while lowering a statement tree
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A pass cannot produce a valid statement. The pipeline stops here and
    /// retrying the same tree yields the same failure.
    #[error("{pass} failed at {node}: {reason}")]
    Pass {
        pass: Pass,
        node: NodeRef,
        reason: String,
    },

    /// No built-in or registered dialect has this name
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    /// Custom dialect registration was rejected
    #[error("Dialect registration error: {0}")]
    Registration(String),

    /// Internal error (should not happen in normal usage)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a pass failure
    pub fn pass(pass: Pass, node: NodeRef, reason: impl Into<String>) -> Self {
        Error::Pass {
            pass,
            node,
            reason: reason.into(),
        }
    }

    /// Create a pagination failure for a query that has nothing to order by
    pub fn pagination_requires_ordering(query: QueryId) -> Self {
        Error::pass(
            Pass::CorrectPagination,
            NodeRef::Query(query),
            "pagination requires ordering",
        )
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

/// The node an error is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Statement,
    Query(QueryId),
    Source(SourceId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Statement => write!(f, "statement"),
            NodeRef::Query(id) => write!(f, "{}", id),
            NodeRef::Source(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_error_message() {
        let err = Error::pagination_requires_ordering(QueryId(7));
        assert_eq!(
            err.to_string(),
            "correct_pagination failed at query #7: pagination requires ordering"
        );
        assert!(matches!(
            err,
            Error::Pass {
                pass: Pass::CorrectPagination,
                node: NodeRef::Query(QueryId(7)),
                ..
            }
        ));
    }
}
