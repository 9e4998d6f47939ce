use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ExecutorError;

/// Outcome of one subprocess invocation, before it is folded into a
/// [`crate::ModuleExecResult`].
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Spawn `binary args...` in `workspace` with the overlaid environment,
/// capture stdout and stderr concurrently, and enforce `timeout` by
/// killing the child (spec §4.8 step 3c/3d, §5 "per-module timeouts ...
/// wrapping the subprocess context"). Stdout and stderr are collected on
/// separate readers so callers get them back distinctly rather than
/// interleaved into one buffer.
///
/// Environment overlay (spec §6 "compatibility-critical"): caller-supplied
/// `env` always wins; `TF_INPUT=false`/`TERRAGRUNT_NON_INTERACTIVE=true`
/// are set when `non_interactive`, and `TERRAGRUNT_AUTO_APPROVE=true` when
/// `auto_approve`.
pub async fn run(
    binary: &str,
    workspace: &Path,
    args: &[String],
    env: &HashMap<String, String>,
    timeout: Duration,
    non_interactive: bool,
    auto_approve: bool,
) -> Result<ProcessOutput, ExecutorError> {
    debug!(binary, ?args, workspace = %workspace.display(), "running iac command");

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .current_dir(workspace)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    if non_interactive {
        cmd.env("TF_INPUT", "false").env("TERRAGRUNT_NON_INTERACTIVE", "true");
    }
    if auto_approve {
        cmd.env("TERRAGRUNT_AUTO_APPROVE", "true");
    }
    cmd.envs(env);

    let mut child = cmd.spawn().map_err(|source| ExecutorError::Spawn {
        binary: binary.to_string(),
        module: workspace.display().to_string(),
        source,
    })?;

    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");

    let stdout_task = tokio::spawn(async move {
        let mut out = String::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            out.push_str(&line);
            out.push('\n');
        }
        out
    });
    let stderr_task = tokio::spawn(async move {
        let mut out = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            out.push_str(&line);
            out.push('\n');
        }
        out
    });

    let wait = async {
        let status = child.wait().await;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        (status, stdout, stderr)
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok((status, stdout, stderr)) => {
            let status = status.map_err(|e| ExecutorError::Internal(format!("wait: {}", e)))?;
            let exit_code = status.code();
            if exit_code != Some(0) {
                warn!(binary, ?exit_code, "iac command exited non-zero");
            }
            Ok(ProcessOutput { exit_code, stdout, stderr, timed_out: false })
        }
        Err(_) => {
            let _ = child.kill().await;
            warn!(binary, ?timeout, "iac command timed out, killed");
            Ok(ProcessOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: format!("{} timed out after {:?}", binary, timeout),
                timed_out: true,
            })
        }
    }
}
