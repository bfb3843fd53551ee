#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when an evaluator is invoked without the piece that would
    /// perform the named operation.
    #[error("unimplemented capability: no implementation supplied for `{capability}`")]
    Unimplemented {
        /// The operation that has no implementation.
        capability: &'static str,
    },

    /// Returned when a component is constructed with inconsistent or
    /// out-of-range settings.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Returned when two shapes that must agree do not.
    #[error("dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// What was being checked.
        context: &'static str,
        /// The expected size.
        expected: usize,
        /// The actual size.
        got: usize,
    },

    /// Returned when an updater receives a batch without samples.
    #[error("update batch contains no samples")]
    EmptyBatch,

    /// Returned when a numerical routine produces non-finite results.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Returned by rollouts or scoring functions that cannot produce a cost.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Returned when an async task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),

    /// Returned when writing or reading persisted results fails.
    #[cfg(feature = "serde")]
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = core::result::Result<T, Error>;
