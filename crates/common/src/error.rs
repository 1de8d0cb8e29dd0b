use thiserror::Error as ThisError;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the memo, the logical-property builder, the rule
/// passes, and the cross-engine push-down planner.
///
/// The four kinds named in the core's error table (§7) are first-class
/// variants; the rest are general plumbing needed by callers that resolve
/// columns/tables or cancel a blocking staleness check.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// The query asks for something the time-series engine, or this core,
    /// cannot express — e.g. an `only-tag` time-series scan that also
    /// selects a non-tag column, or a scan-agg parameter that requires
    /// parsing a timestamp string the statistic reader does not support.
    /// Fatal for the whole query.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),

    /// An internal consistency rule was violated: `SetBestProps` called
    /// twice with non-equal values, `HasPlaceholders` on a non-relational
    /// root, or an interner collision between expressions whose children
    /// are not pointer-identical. The memo that raised this is unusable.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Memory accounting reports `requested + reserved > budget`.
    #[error("memory budget exceeded: requested {requested} + reserved {reserved} > budget {budget}")]
    MemoryBudgetExceeded {
        /// Bytes newly requested by the operation that triggered the check.
        requested: u64,
        /// Bytes already reserved against the budget.
        reserved: u64,
        /// The configured budget, in bytes.
        budget: u64,
    },

    /// Catalog I/O failed while checking memo staleness. Returned verbatim
    /// to the caller; the memo must be treated as stale.
    #[error("staleness check failed: {0}")]
    StalenessCatalogError(String),

    /// A cancellation token was observed canceled mid-operation (currently
    /// only the staleness checker's catalog lookups are cancellable).
    #[error("operation canceled")]
    Cancelled,

    /// A referenced table could not be resolved against the catalog.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A referenced column could not be resolved.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A column name resolved to more than one candidate.
    #[error("ambiguous column: {0}")]
    AmbiguousColumn(String),

    /// A type-checking invariant failed (e.g. a grouping column is
    /// bytes-like where the rule forbids it).
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// What the caller expected.
        expected: String,
        /// What was actually found.
        actual: String,
    },

    /// Catch-all for conditions that should be unreachable given the
    /// documented preconditions.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::FeatureNotSupported`].
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::FeatureNotSupported(msg.into())
    }

    /// Shorthand for [`Error::InvariantViolation`].
    pub fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    /// Shorthand for [`Error::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Shorthand for [`Error::TableNotFound`].
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound(name.into())
    }

    /// Shorthand for [`Error::ColumnNotFound`].
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Error::ColumnNotFound(name.into())
    }

    /// Returns `true` for error kinds that are fatal for the whole query
    /// rather than recoverable by falling back to a different plan shape.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::FeatureNotSupported(_) | Error::InvariantViolation(_) | Error::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(
            format!("{}", Error::unsupported("only-tag scan with non-tag column")),
            "feature not supported: only-tag scan with non-tag column"
        );
        assert_eq!(
            format!("{}", Error::invariant("SetBestProps written twice")),
            "invariant violation: SetBestProps written twice"
        );
        assert_eq!(
            format!(
                "{}",
                Error::MemoryBudgetExceeded {
                    requested: 10,
                    reserved: 90,
                    budget: 95
                }
            ),
            "memory budget exceeded: requested 10 + reserved 90 > budget 95"
        );
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::unsupported("x").is_fatal());
        assert!(Error::invariant("x").is_fatal());
        assert!(Error::Cancelled.is_fatal());
        assert!(!Error::table_not_found("t").is_fatal());
        assert!(!Error::StalenessCatalogError("timeout".into()).is_fatal());
    }

    #[test]
    fn error_is_clone_and_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
        let e = Error::internal("x");
        let _ = e.clone();
    }
}
