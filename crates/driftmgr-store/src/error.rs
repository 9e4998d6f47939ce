use thiserror::Error;

/// Errors raised by a [`crate::Repository`] implementation. The core treats
/// persistence as an external collaborator (spec §1 Non-goals: "does not
/// persist history itself — it emits records to a repository abstraction");
/// this taxonomy exists so the summariser can distinguish "no data yet" from
/// a genuine backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("internal store error: {0}")]
    Internal(String),
}
