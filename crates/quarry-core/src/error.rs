//! Error types for query compilation.

use thiserror::Error;

/// Errors raised while compiling a query into SQL text.
///
/// These are structural mistakes in the request itself. Failures of the
/// collaborator that executes the SQL never pass through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Two parallel inputs that must pair up element by element differ in length.
    #[error("{what}: {left} entries on the left but {right} on the right")]
    LengthMismatch {
        /// What was being paired (e.g. "columns/values").
        what: &'static str,
        /// Length of the first input.
        left: usize,
        /// Length of the second input.
        right: usize,
    },

    /// A HAVING clause was supplied without a GROUP BY clause.
    #[error("HAVING requires a GROUP BY clause")]
    HavingWithoutGroupBy,
}

/// Result type alias for query compilation.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Fails with [`QueryError::LengthMismatch`] unless both lengths agree.
pub(crate) fn ensure_same_len(what: &'static str, left: usize, right: usize) -> Result<()> {
    if left == right {
        Ok(())
    } else {
        Err(QueryError::LengthMismatch { what, left, right })
    }
}
