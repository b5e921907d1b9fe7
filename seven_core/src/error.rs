use thiserror::Error;

/// Error raised by user-supplied predicates, filters and actions.
///
/// The engine never wraps or inspects these; whatever a rule fails with is
/// handed back to the caller of `abilities()` as-is.
pub type RuleError = Box<dyn std::error::Error + Send + Sync>;

pub type RuleResult<T> = std::result::Result<T, RuleError>;

/// Malformed guard configuration, reported when a rule is registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("`check: {0}` requires exactly one of `equal` or `in`")]
    MissingComparison(String),

    #[error("`check: {0}` accepts only one of `equal` or `in`, not both")]
    AmbiguousComparison(String),

    #[error("`{0}` given without `check`")]
    ComparisonWithoutCheck(&'static str),

    #[error("`check` and `pass` cannot be combined")]
    ConflictingGuards,

    #[error("`pass` must be a callable or a non-empty filter name")]
    InvalidPass,

    #[error("Filter not found: {0}")]
    UnknownFilter(String),
}
