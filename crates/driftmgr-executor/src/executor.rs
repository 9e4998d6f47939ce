use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use driftmgr_core::{DependencyGraph, ModuleStatus};
use driftmgr_graph::execution_groups;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::ExecutorError;
use crate::options::RunAllOptions;
use crate::process;
use crate::result::{parse_plan_summary, ModuleExecResult, ProgressSnapshot};

#[derive(Default)]
struct ProgressState {
    total: usize,
    completed: usize,
    success: usize,
    failed: usize,
    skipped: usize,
    running: usize,
    started_at: Option<Instant>,
}

/// Runs a command across every module in a [`DependencyGraph`], group by
/// group, honoring cancellation, retries and per-module timeouts (spec
/// §4.8): a bounded-parallel, dependency-ordered fan-out over per-module
/// subprocess invocations.
pub struct RunAllExecutor {
    cancelled: Arc<AtomicBool>,
    progress: Arc<Mutex<ProgressState>>,
}

impl Default for RunAllExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RunAllExecutor {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Mutex::new(ProgressState::default())),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> ProgressSnapshot {
        let p = self.progress.lock().expect("progress mutex poisoned");
        ProgressSnapshot {
            total: p.total,
            completed: p.completed,
            success: p.success,
            failed: p.failed,
            skipped: p.skipped,
            running: p.running,
            duration: p.started_at.map(|s| s.elapsed()).unwrap_or_default(),
        }
    }

    /// Execute `options.command` across every admitted module of `graph`
    /// (spec §4.8 algorithm). Dry-run short-circuits after planning the
    /// groups, returning every admitted module pre-marked `completed`
    /// with no subprocess invoked.
    pub async fn run_all(
        &self,
        graph: &DependencyGraph,
        options: &RunAllOptions,
    ) -> Result<Vec<ModuleExecResult>, ExecutorError> {
        let groups = self.plan_groups(graph, options)?;
        let total: usize = groups.iter().map(|g| g.len()).sum();
        let iam_roles: HashMap<String, Option<String>> =
            graph.modules.iter().map(|(path, m)| (path.clone(), m.config.iam_role.clone())).collect();

        {
            let mut p = self.progress.lock().expect("progress mutex poisoned");
            *p = ProgressState { total, started_at: Some(Instant::now()), ..ProgressState::default() };
        }

        let mut results: HashMap<String, ModuleExecResult> =
            groups.iter().flatten().map(|path| (path.clone(), ModuleExecResult::pending(path.clone()))).collect();

        let mut group_failed_overall = false;
        for group in &groups {
            if self.is_cancelled() || (group_failed_overall && !options.ignore_errors) {
                for path in group {
                    let entry = results.get_mut(path).expect("module present");
                    *entry = ModuleExecResult::skipped(path.clone(), "cancelled before group start");
                    self.bump_skipped();
                }
                continue;
            }

            if options.dry_run {
                for path in group {
                    let entry = results.get_mut(path).expect("module present");
                    entry.status = ModuleStatus::Completed;
                    entry.started_at = Some(Utc::now());
                    entry.finished_at = entry.started_at;
                    self.bump_success();
                }
                continue;
            }

            let group_results = self.run_group(group, options, &iam_roles).await;
            let any_failed = group_results.iter().any(|r| r.status == ModuleStatus::Failed);
            if any_failed && !options.ignore_errors {
                group_failed_overall = true;
                self.cancel();
            }
            for r in group_results {
                results.insert(r.module_path.clone(), r);
            }
        }

        // Preserve the caller-visible group order rather than hashmap order.
        let ordered: Vec<ModuleExecResult> = groups
            .into_iter()
            .flatten()
            .map(|path| results.remove(&path).expect("every planned module has a result"))
            .collect();
        Ok(ordered)
    }

    /// Compute execution groups (spec §4.7) and reduce each to the
    /// modules `options` admits (step 1 "apply include/exclude filters").
    /// `ignore_dependencies` flattens everything into one group (spec
    /// §4.8 "flatten all modules into one group").
    fn plan_groups(&self, graph: &DependencyGraph, options: &RunAllOptions) -> Result<Vec<Vec<String>>, ExecutorError> {
        if options.ignore_dependencies {
            let mut flat: Vec<String> = graph
                .modules
                .iter()
                .filter(|(_, m)| options.include_skipped || !m.config.skip)
                .map(|(path, _)| path.clone())
                .filter(|path| options.admits(path))
                .collect();
            flat.sort();
            return Ok(if flat.is_empty() { Vec::new() } else { vec![flat] });
        }

        let groups = execution_groups(graph, options.include_skipped)?;
        Ok(groups
            .into_iter()
            .map(|group| group.into_iter().filter(|path| options.admits(path)).collect::<Vec<_>>())
            .filter(|group: &Vec<String>| !group.is_empty())
            .collect())
    }

    /// Run every module in one group concurrently under a semaphore of
    /// size `options.parallelism`, and wait for the group to drain before
    /// returning (spec §4.8 step 3/4, §5 "group barrier").
    async fn run_group(
        &self,
        group: &[String],
        options: &RunAllOptions,
        iam_roles: &HashMap<String, Option<String>>,
    ) -> Vec<ModuleExecResult> {
        let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
        let mut tasks = JoinSet::new();

        for path in group {
            if self.is_cancelled() {
                tasks.spawn(std::future::ready(ModuleExecResult::skipped(path.clone(), "cancelled before acquiring slot")));
                continue;
            }

            let path = path.clone();
            let options = options.clone();
            let iam_role = iam_roles.get(&path).cloned().flatten();
            let semaphore = semaphore.clone();
            let cancelled = self.cancelled.clone();
            let progress = self.progress.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                if cancelled.load(Ordering::SeqCst) {
                    return ModuleExecResult::skipped(path, "cancelled before spawning subprocess");
                }
                bump_running(&progress, 1);
                let result = run_module(&path, &options, iam_role.as_deref()).await;
                bump_running(&progress, -1);
                result
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "module task panicked");
                    ModuleExecResult {
                        status: ModuleStatus::Failed,
                        error: Some(format!("task panicked: {}", e)),
                        ..ModuleExecResult::pending("<unknown>")
                    }
                }
            };
            match result.status {
                ModuleStatus::Completed => self.bump_success(),
                ModuleStatus::Failed => self.bump_failed(),
                ModuleStatus::Skipped => self.bump_skipped(),
                _ => {}
            }
            results.push(result);
        }
        results
    }

    fn bump_success(&self) {
        let mut p = self.progress.lock().expect("progress mutex poisoned");
        p.completed += 1;
        p.success += 1;
    }

    fn bump_failed(&self) {
        let mut p = self.progress.lock().expect("progress mutex poisoned");
        p.completed += 1;
        p.failed += 1;
    }

    fn bump_skipped(&self) {
        let mut p = self.progress.lock().expect("progress mutex poisoned");
        p.completed += 1;
        p.skipped += 1;
    }
}

fn bump_running(progress: &Arc<Mutex<ProgressState>>, delta: i64) {
    let mut p = progress.lock().expect("progress mutex poisoned");
    p.running = (p.running as i64 + delta).max(0) as usize;
}

/// Run one module to completion, retrying on transient failures (spec
/// §4.8 "Retries"). `iam_role` is the module's own parsed
/// `TerragruntConfig.iam_role`, if any.
async fn run_module(module_path: &str, options: &RunAllOptions, iam_role: Option<&str>) -> ModuleExecResult {
    let mut result = ModuleExecResult::pending(module_path.to_string());
    result.status = ModuleStatus::Running;
    result.started_at = Some(Utc::now());

    let args = options.build_args(iam_role);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        result.attempts = attempt;

        let outcome = process::run(
            &options.binary,
            Path::new(module_path),
            &args,
            &options.env,
            options.per_module_timeout,
            options.non_interactive,
            options.auto_approve,
        )
        .await;

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                result.status = ModuleStatus::Failed;
                result.finished_at = Some(Utc::now());
                result.error = Some(e.to_string());
                return result;
            }
        };

        result.stdout = outcome.stdout;
        result.stderr = outcome.stderr;
        result.exit_code = outcome.exit_code;
        result.plan_summary = parse_plan_summary(&result.stdout);

        let succeeded = !outcome.timed_out && outcome.exit_code == Some(0);
        if succeeded {
            result.status = ModuleStatus::Completed;
            result.finished_at = Some(Utc::now());
            return result;
        }

        let combined = format!("{}\n{}", result.stdout, result.stderr);
        let can_retry = attempt <= options.retry_max_attempts as u32 && options.is_retryable(&combined);
        if can_retry {
            info!(module_path, attempt, "retrying after transient failure");
            tokio::time::sleep(options.retry_interval).await;
            continue;
        }

        result.status = ModuleStatus::Failed;
        result.finished_at = Some(Utc::now());
        result.error = Some(if outcome.timed_out {
            "timed out".to_string()
        } else {
            format!("exit code {:?}", result.exit_code)
        });
        return result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftmgr_core::{TerragruntConfig, TerragruntModule};
    use std::time::Duration;

    /// Real, existing directories for each logical module path, since the
    /// executor spawns subprocesses with `current_dir` set to the module
    /// path. Named after the test so parallel test runs don't collide.
    fn scratch_dirs(test_name: &str, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| {
                let dir = std::env::temp_dir().join("driftmgr-executor-tests").join(test_name).join(n);
                std::fs::create_dir_all(&dir).expect("create scratch dir");
                dir.to_string_lossy().to_string()
            })
            .collect()
    }

    fn graph_with(modules: &[(String, Vec<String>)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (path, deps) in modules {
            let mut module = TerragruntModule::new(path.clone(), TerragruntConfig::default());
            module.dependencies = deps.clone();
            graph.insert_module(module);
        }
        graph
    }

    /// `build_args` now always appends terragrunt-style flags
    /// (`-input=false`, `--terragrunt-log-level=...`, ...) that real
    /// `sleep` rejects, so timing-sensitive tests run a tiny passthrough
    /// script that reads `$1` as a duration and ignores the rest.
    fn sleep_script(test_name: &str) -> String {
        let dir = std::env::temp_dir().join("driftmgr-executor-tests").join(test_name);
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        let script = dir.join("sleep.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep \"$1\"\n").expect("write sleep script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod sleep script");
        }
        script.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn scenario_8_four_modules_one_group_parallelism_two() {
        let dirs = scratch_dirs("scenario_8", &["a", "b", "c", "d"]);
        let graph = graph_with(&dirs.iter().map(|d| (d.clone(), Vec::new())).collect::<Vec<_>>());

        let mut options = RunAllOptions::new("0.1");
        options.binary = sleep_script("scenario_8");
        options.parallelism = 2;

        let executor = RunAllExecutor::new();
        let start = Instant::now();
        let results = executor.run_all(&graph, &options).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.status == ModuleStatus::Completed));
        assert!(elapsed >= Duration::from_millis(180), "elapsed too short: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "elapsed too long: {:?}", elapsed);
    }

    #[tokio::test]
    async fn failure_cancels_subsequent_groups_unless_ignore_errors() {
        let dirs = scratch_dirs("failure_cancels", &["a", "b"]);
        let graph = graph_with(&[(dirs[0].clone(), Vec::new()), (dirs[1].clone(), vec![dirs[0].clone()])]);

        let mut options = RunAllOptions::new("plan");
        options.binary = "false".to_string();

        let executor = RunAllExecutor::new();
        let results = executor.run_all(&graph, &options).await.unwrap();

        let a = results.iter().find(|r| r.module_path == dirs[0]).unwrap();
        let b = results.iter().find(|r| r.module_path == dirs[1]).unwrap();
        assert_eq!(a.status, ModuleStatus::Failed);
        assert_eq!(b.status, ModuleStatus::Skipped);
    }

    #[tokio::test]
    async fn ignore_errors_lets_independent_groups_proceed() {
        let dirs = scratch_dirs("ignore_errors", &["a", "b"]);
        let graph = graph_with(&dirs.iter().map(|d| (d.clone(), Vec::new())).collect::<Vec<_>>());

        let mut options = RunAllOptions::new("plan");
        options.binary = "false".to_string();
        options.ignore_errors = true;
        options.ignore_dependencies = true;

        let executor = RunAllExecutor::new();
        let results = executor.run_all(&graph, &options).await.unwrap();
        assert!(results.iter().all(|r| r.status == ModuleStatus::Failed));
    }

    #[tokio::test]
    async fn dry_run_marks_every_admitted_module_completed_without_spawning() {
        let dirs = scratch_dirs("dry_run", &["a"]);
        let graph = graph_with(&[(dirs[0].clone(), Vec::new())]);

        let mut options = RunAllOptions::new("apply");
        options.dry_run = true;
        options.binary = "this-binary-does-not-exist".to_string();

        let executor = RunAllExecutor::new();
        let results = executor.run_all(&graph, &options).await.unwrap();
        assert_eq!(results[0].status, ModuleStatus::Completed);
        assert!(results[0].stdout.is_empty());
    }

    #[test]
    fn target_filter_narrows_groups() {
        let dirs = scratch_dirs("target_filter", &["a", "b"]);
        let graph = graph_with(&dirs.iter().map(|d| (d.clone(), Vec::new())).collect::<Vec<_>>());

        let mut options = RunAllOptions::new("plan");
        options.target_modules = vec![dirs[0].clone()];
        let executor = RunAllExecutor::new();
        let groups = executor.plan_groups(&graph, &options).unwrap();
        assert_eq!(groups, vec![vec![dirs[0].clone()]]);
    }
}
