use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("diff error: {0}")]
    Diff(#[from] driftmgr_diff::DiffError),

    #[error("store error: {0}")]
    Store(#[from] driftmgr_store::StoreError),

    #[error("internal drift error: {0}")]
    Internal(String),
}
