use thiserror::Error;

/// Shared error taxonomy for core domain validation. Component crates define
/// their own richer error enums (`ConfigError`, `GraphError`, `ExecutorError`
/// ...) and convert into or wrap these where the failure originates in a
/// domain invariant rather than in I/O or subprocess machinery.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("resource missing required field: {0}")]
    MissingRequiredField(String),

    #[error("unknown drift type: {0}")]
    UnknownDriftType(String),

    #[error("unknown change type: {0}")]
    UnknownChangeType(String),

    #[error("illegal module status transition: {from} -> {to}")]
    IllegalStatusTransition { from: String, to: String },

    #[error("dependency cycle detected at module: {0}")]
    Cycle(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}
