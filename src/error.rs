//! Error types.
//!
//! Failing to find an analysis is *not* an error: an unanalysable word comes
//! back as an empty [`Analysis`](crate::Analysis). The types here cover the
//! conditions that abort a call:
//!
//! - [`ProjectError`]: the project could not be assembled (bad regex,
//!   integrity violations found while validating rules).
//! - [`AnalysisError`]: no project is loaded, the grammar turned out to be
//!   corrupt while running, or the search ran out of budget.
//! - [`IntegrityError`]: the concrete way in which a rule is corrupt. It is
//!   carried by both of the above.

use crate::Symbol;

/// Result alias using [`AnalysisError`] by default.
pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

/// Why an analysis call was aborted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// The session has no project: it was never initialised or has been
    /// terminated.
    #[error("no project is loaded")]
    NotLoaded,

    /// A rule turned out to be corrupt while being interpreted.
    #[error("grammar integrity violation in rule `{rule}`: {source}")]
    GrammarIntegrity {
        rule: String,
        #[source]
        source: IntegrityError,
    },

    /// The step budget configured in [`Options`](crate::Options) was used up.
    #[error("search aborted after {steps} steps")]
    BudgetExceeded { steps: u64 },
}

impl AnalysisError {
    pub(crate) fn integrity(rule: &str, source: IntegrityError) -> Self {
        AnalysisError::GrammarIntegrity { rule: rule.to_string(), source }
    }
}

/// A structural defect in a compiled rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("reference to undefined symbol #{0:?}")]
    UndefinedSymbol(Symbol),

    #[error("capture {0} is used before it was opened")]
    UnknownCapture(u8),

    #[error("child index {index} is out of range for a pattern of {arity} elements")]
    ChildOutOfRange { index: usize, arity: usize },

    #[error("a morph was produced without a class tag")]
    MissingTag,

    #[error("combination pattern is empty")]
    EmptyPattern,

    #[error("attribute-value structure nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Failure to assemble a [`Project`](crate::Project).
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("rule `{rule}` is invalid: {source}")]
    Integrity {
        rule: String,
        #[source]
        source: IntegrityError,
    },

    #[error("rule name `{0}` is defined more than once")]
    DuplicateRule(String),

    #[error("accepting tag #{0:?} is not a defined symbol")]
    UndefinedAcceptTag(Symbol),

    #[error("attribute `{attr}` is given conflicting values")]
    ConflictingValues { attr: String },
}
