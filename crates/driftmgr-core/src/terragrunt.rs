use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `remote_state { generate { ... } }` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStateGenerate {
    pub path: String,
    pub if_exists: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStateConfig {
    pub backend: String,
    pub config: HashMap<String, Value>,
    pub generate: Option<RemoteStateGenerate>,
}

/// One `include "name"? { ... }` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeBlock {
    /// `None` for the unlabeled/default include.
    pub name: Option<String>,
    pub path: String,
    pub expose: bool,
    pub merge_strategy: Option<String>,
}

/// One `dependency "name" { ... }` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyBlock {
    pub name: String,
    pub config_path: String,
    #[serde(default)]
    pub mock_outputs: HashMap<String, Value>,
    pub mock_outputs_merge_with_state: Option<String>,
    #[serde(default)]
    pub skip: bool,
}

/// One `generate "name" { ... }` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateBlock {
    pub name: String,
    pub path: String,
    pub if_exists: String,
    pub contents: String,
}

/// A fully parsed `terragrunt.hcl` file (spec §3 "Terragrunt Module.config").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerragruntConfig {
    /// `terraform { source = ... }`. Required if the module is runnable.
    pub terraform_source: Option<String>,
    pub remote_state: Option<RemoteStateConfig>,
    #[serde(default)]
    pub includes: Vec<IncludeBlock>,
    #[serde(default)]
    pub dependency_blocks: Vec<DependencyBlock>,
    /// Relative paths from a bare `dependencies { paths = [...] }` block.
    #[serde(default)]
    pub dependency_paths: Vec<String>,
    #[serde(default)]
    pub generate_blocks: HashMap<String, GenerateBlock>,
    #[serde(default)]
    pub locals: HashMap<String, Value>,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    pub iam_role: Option<String>,
    #[serde(default)]
    pub skip: bool,
    pub terraform_version_constraint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl ModuleStatus {
    /// Whether `self -> next` is a legal forward transition (spec §3:
    /// "mutable and monotonically advances pending -> running ->
    /// {completed, failed, skipped}").
    pub fn can_transition_to(&self, next: ModuleStatus) -> bool {
        matches!(
            (self, next),
            (ModuleStatus::Pending, ModuleStatus::Running)
                | (ModuleStatus::Pending, ModuleStatus::Skipped)
                | (ModuleStatus::Running, ModuleStatus::Completed)
                | (ModuleStatus::Running, ModuleStatus::Failed)
        )
    }
}

/// A single terragrunt module discovered under a root directory (spec §3
/// "Terragrunt Module").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerragruntModule {
    /// Absolute path to the module directory.
    pub path: String,
    pub config: TerragruntConfig,
    /// Absolute paths of modules this one depends on.
    pub dependencies: Vec<String>,
    /// Absolute paths of modules that depend on this one.
    pub dependents: Vec<String>,
    pub status: ModuleStatus,
}

impl TerragruntModule {
    pub fn new(path: impl Into<String>, config: TerragruntConfig) -> Self {
        Self {
            path: path.into(),
            config,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            status: ModuleStatus::Pending,
        }
    }
}

/// The resolved DAG over a set of [`TerragruntModule`]s (spec §3 "Dependency
/// Graph"). Edges in `dependencies` always mirror edges in `dependents`;
/// the graph is acyclic once constructed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub modules: HashMap<String, TerragruntModule>,
    pub dependencies: HashMap<String, Vec<String>>,
    pub dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module and wire its declared dependency edges into both
    /// `dependencies` and `dependents`. Does not itself check for cycles —
    /// that is the resolver's job once the whole set is known.
    pub fn insert_module(&mut self, module: TerragruntModule) {
        let path = module.path.clone();
        for dep in &module.dependencies {
            self.dependencies.entry(path.clone()).or_default().push(dep.clone());
            self.dependents.entry(dep.clone()).or_default().push(path.clone());
        }
        self.dependencies.entry(path.clone()).or_default();
        self.dependents.entry(path.clone()).or_default();
        self.modules.insert(path, module);
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_spec_order() {
        assert!(ModuleStatus::Pending.can_transition_to(ModuleStatus::Running));
        assert!(ModuleStatus::Pending.can_transition_to(ModuleStatus::Skipped));
        assert!(ModuleStatus::Running.can_transition_to(ModuleStatus::Completed));
        assert!(ModuleStatus::Running.can_transition_to(ModuleStatus::Failed));
        assert!(!ModuleStatus::Completed.can_transition_to(ModuleStatus::Running));
        assert!(!ModuleStatus::Pending.can_transition_to(ModuleStatus::Completed));
    }

    #[test]
    fn insert_module_mirrors_edges() {
        let mut graph = DependencyGraph::new();
        let mut a = TerragruntModule::new("/root/a", TerragruntConfig::default());
        a.dependencies.push("/root/b".to_string());
        graph.insert_module(a);

        let b = TerragruntModule::new("/root/b", TerragruntConfig::default());
        graph.insert_module(b);

        assert_eq!(graph.dependencies.get("/root/a").unwrap(), &vec!["/root/b".to_string()]);
        assert_eq!(graph.dependents.get("/root/b").unwrap(), &vec!["/root/a".to_string()]);
        assert_eq!(graph.module_count(), 2);
    }
}
