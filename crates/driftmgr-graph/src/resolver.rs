use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use driftmgr_core::{DependencyGraph, TerragruntModule};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::GraphError;

/// Build the dependency DAG over a set of discovered modules (spec §4.7).
///
/// Each module's `dependency "n" { config_path = … }` blocks and each entry
/// in `dependencies.paths` are resolved relative to the module's own
/// directory into the absolute path of another discovered module, producing
/// one directed edge per dependency. Edges are mirrored into `dependents`.
/// Construction fails if a dependency path does not resolve to a discovered
/// module, or if the resulting graph contains a cycle.
pub fn build_graph(mut modules: Vec<TerragruntModule>) -> Result<DependencyGraph, GraphError> {
    let known: HashSet<String> = modules.iter().map(|m| m.path.clone()).collect();

    for module in modules.iter_mut() {
        let module_dir = PathBuf::from(&module.path);
        let mut deps = Vec::new();

        for dep in &module.config.dependency_blocks {
            let resolved = resolve_relative(&module_dir, &dep.config_path);
            if !known.contains(&resolved) {
                return Err(GraphError::UnresolvedDependency {
                    module: module.path.clone(),
                    dependency: dep.config_path.clone(),
                });
            }
            deps.push(resolved);
        }

        for raw in &module.config.dependency_paths {
            let resolved = resolve_relative(&module_dir, raw);
            if !known.contains(&resolved) {
                return Err(GraphError::UnresolvedDependency {
                    module: module.path.clone(),
                    dependency: raw.clone(),
                });
            }
            deps.push(resolved);
        }

        deps.sort();
        deps.dedup();
        module.dependencies = deps;
    }

    let mut graph = DependencyGraph::new();
    for module in modules {
        graph.insert_module(module);
    }

    detect_cycles(&graph)?;
    Ok(graph)
}

/// Join `relative` onto `base` and lexically normalise `.`/`..` segments
/// without touching the filesystem (module directories may not exist in
/// tests, only in real terragrunt trees).
fn resolve_relative(base: &Path, relative: &str) -> String {
    let joined = base.join(relative);
    let mut out: Vec<std::ffi::OsString> = Vec::new();
    for component in joined.components() {
        use std::path::Component::*;
        match component {
            ParentDir => {
                out.pop();
            }
            CurDir => {}
            other => out.push(other.as_os_str().to_owned()),
        }
    }
    let mut normalized = PathBuf::new();
    for part in out {
        normalized.push(part);
    }
    normalized.to_string_lossy().to_string()
}

fn detect_cycles(graph: &DependencyGraph) -> Result<(), GraphError> {
    let mut pg = DiGraph::<String, ()>::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();

    for path in graph.modules.keys() {
        let idx = pg.add_node(path.clone());
        index_of.insert(path.clone(), idx);
    }
    for (path, deps) in &graph.dependencies {
        let Some(&from) = index_of.get(path) else { continue };
        for dep in deps {
            if let Some(&to) = index_of.get(dep) {
                pg.add_edge(from, to, ());
            }
        }
    }

    match toposort(&pg, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(GraphError::CycleDetected {
            module: pg[cycle.node_id()].clone(),
        }),
    }
}

/// Compute parallel execution groups via Kahn's algorithm (spec §4.7):
/// repeatedly collect modules with in-degree 0 (considering only edges
/// between modules still in play), emit them as a group sorted
/// lexicographically for determinism, then decrement their dependents'
/// in-degree. `include_skipped` controls whether `skip=true` modules are
/// included at all.
pub fn execution_groups(
    graph: &DependencyGraph,
    include_skipped: bool,
) -> Result<Vec<Vec<String>>, GraphError> {
    let mut remaining: HashSet<String> = graph
        .modules
        .iter()
        .filter(|(_, m)| include_skipped || !m.config.skip)
        .map(|(path, _)| path.clone())
        .collect();

    let mut in_degree: HashMap<String, usize> = HashMap::new();
    for path in &remaining {
        let count = graph
            .dependencies
            .get(path)
            .map(|deps| deps.iter().filter(|d| remaining.contains(*d)).count())
            .unwrap_or(0);
        in_degree.insert(path.clone(), count);
    }

    let mut groups = Vec::new();
    while !remaining.is_empty() {
        let mut ready: Vec<String> = remaining
            .iter()
            .filter(|p| in_degree.get(*p).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();

        if ready.is_empty() {
            let mut stuck: Vec<String> = remaining.into_iter().collect();
            stuck.sort();
            return Err(GraphError::StalledOrdering(stuck));
        }

        ready.sort();
        for path in &ready {
            remaining.remove(path);
            in_degree.remove(path);
        }
        for path in &ready {
            if let Some(dependents) = graph.dependents.get(path) {
                for dependent in dependents {
                    if let Some(count) = in_degree.get_mut(dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
        groups.push(ready);
    }
    Ok(groups)
}

/// Dependencies of `path`; `recursive` walks the transitive closure.
pub fn module_dependencies(graph: &DependencyGraph, path: &str, recursive: bool) -> Vec<String> {
    transitive_closure(&graph.dependencies, path, recursive)
}

/// Dependents of `path`; `recursive` walks the transitive closure.
pub fn module_dependents(graph: &DependencyGraph, path: &str, recursive: bool) -> Vec<String> {
    transitive_closure(&graph.dependents, path, recursive)
}

/// Every module transitively impacted by a change to `path` (spec §4.7:
/// "GetImpactedModules(path) = recursive dependents").
pub fn impacted_modules(graph: &DependencyGraph, path: &str) -> Vec<String> {
    module_dependents(graph, path, true)
}

fn transitive_closure(edges: &HashMap<String, Vec<String>>, start: &str, recursive: bool) -> Vec<String> {
    let direct = edges.get(start).cloned().unwrap_or_default();
    if !recursive {
        let mut out = direct;
        out.sort();
        return out;
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut stack = direct;
    let mut out = Vec::new();
    while let Some(node) = stack.pop() {
        if seen.insert(node.clone()) {
            out.push(node.clone());
            if let Some(next) = edges.get(&node) {
                stack.extend(next.clone());
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Aggregate statistics over the graph (spec §4.7: "totals, average/max
/// fan-out, skipped count").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStats {
    pub total_modules: usize,
    pub average_fan_out: f64,
    pub max_fan_out: usize,
    pub skipped_count: usize,
}

pub fn graph_stats(graph: &DependencyGraph) -> GraphStats {
    let total = graph.modules.len();
    let fan_outs: Vec<usize> = graph.dependencies.values().map(|v| v.len()).collect();
    let max_fan_out = fan_outs.iter().copied().max().unwrap_or(0);
    let average_fan_out = if total == 0 {
        0.0
    } else {
        fan_outs.iter().sum::<usize>() as f64 / total as f64
    };
    let skipped_count = graph.modules.values().filter(|m| m.config.skip).count();

    GraphStats {
        total_modules: total,
        average_fan_out,
        max_fan_out,
        skipped_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftmgr_core::TerragruntConfig;

    fn module(path: &str, deps: &[&str]) -> TerragruntModule {
        let mut m = TerragruntModule::new(path, TerragruntConfig::default());
        m.dependencies = deps.iter().map(|s| s.to_string()).collect();
        m
    }

    /// Build modules whose dependency_blocks reference siblings by relative
    /// path, matching how `build_graph` actually resolves edges (rather than
    /// pre-populating `.dependencies`, which `build_graph` overwrites).
    fn module_with_dep_blocks(path: &str, dep_names: &[&str]) -> TerragruntModule {
        let mut config = TerragruntConfig::default();
        for name in dep_names {
            config.dependency_blocks.push(driftmgr_core::DependencyBlock {
                name: name.to_string(),
                config_path: format!("../{}", name),
                mock_outputs: Default::default(),
                mock_outputs_merge_with_state: None,
                skip: false,
            });
        }
        TerragruntModule::new(path, config)
    }

    #[test]
    fn scenario_6_topological_groups_and_impacted_modules() {
        // spec §8 scenario 6: A (no deps), B/C (dep: A), D (dep: B, C)
        let modules = vec![
            module_with_dep_blocks("/root/a", &[]),
            module_with_dep_blocks("/root/b", &["a"]),
            module_with_dep_blocks("/root/c", &["a"]),
            module_with_dep_blocks("/root/d", &["b", "c"]),
        ];
        let graph = build_graph(modules).expect("acyclic graph should build");

        let groups = execution_groups(&graph, false).expect("no stall");
        assert_eq!(
            groups,
            vec![
                vec!["/root/a".to_string()],
                vec!["/root/b".to_string(), "/root/c".to_string()],
                vec!["/root/d".to_string()],
            ]
        );

        let mut impacted = impacted_modules(&graph, "/root/a");
        impacted.sort();
        assert_eq!(
            impacted,
            vec!["/root/b".to_string(), "/root/c".to_string(), "/root/d".to_string()]
        );
    }

    #[test]
    fn scenario_7_cycle_is_rejected() {
        // spec §8 scenario 7: A -> B -> A
        let modules = vec![
            module_with_dep_blocks("/root/a", &["b"]),
            module_with_dep_blocks("/root/b", &["a"]),
        ];
        let err = build_graph(modules).unwrap_err();
        match err {
            GraphError::CycleDetected { module } => {
                assert!(module == "/root/a" || module == "/root/b");
            }
            other => panic!("expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn skip_flag_excludes_module_from_groups_unless_requested() {
        let mut modules = vec![module("/root/a", &[]), module("/root/b", &[])];
        modules[1].config.skip = true;
        let graph = build_graph(modules).unwrap();

        let without_skipped = execution_groups(&graph, false).unwrap();
        assert_eq!(without_skipped, vec![vec!["/root/a".to_string()]]);

        let with_skipped = execution_groups(&graph, true).unwrap();
        assert_eq!(
            with_skipped,
            vec![vec!["/root/a".to_string(), "/root/b".to_string()]]
        );
    }

    #[test]
    fn unresolved_dependency_path_is_an_error() {
        let modules = vec![module_with_dep_blocks("/root/a", &["missing"])];
        assert!(build_graph(modules).is_err());
    }

    #[test]
    fn graph_stats_reports_fan_out_and_skipped_count() {
        let mut modules = vec![
            module_with_dep_blocks("/root/a", &[]),
            module_with_dep_blocks("/root/b", &["a"]),
            module_with_dep_blocks("/root/c", &["a"]),
        ];
        modules[0].config.skip = true;
        let graph = build_graph(modules).unwrap();
        let stats = graph_stats(&graph);
        assert_eq!(stats.total_modules, 3);
        assert_eq!(stats.max_fan_out, 1);
        assert_eq!(stats.skipped_count, 1);
    }
}
