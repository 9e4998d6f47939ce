use thiserror::Error;

/// Errors raised while building or querying a Terragrunt [`crate::DependencyGraph`]
/// (spec §4.7, §7 "CycleError — emitted by the resolver; fatal; names the
/// offending module").
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cycle detected in module dependency graph, involving module '{module}'")]
    CycleDetected { module: String },

    #[error("unknown module path: {0}")]
    UnknownModule(String),

    #[error("dependency '{dependency}' declared by '{module}' does not resolve to a discovered module")]
    UnresolvedDependency { module: String, dependency: String },

    #[error("execution order computation stalled with modules remaining: {0:?}")]
    StalledOrdering(Vec<String>),
}
