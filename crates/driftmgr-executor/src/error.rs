use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("dependency graph error: {0}")]
    Graph(#[from] driftmgr_graph::GraphError),

    #[error("failed to spawn {binary} in {module}: {source}")]
    Spawn {
        binary: String,
        module: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal executor error: {0}")]
    Internal(String),
}
