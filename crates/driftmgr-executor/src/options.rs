use std::collections::HashMap;
use std::time::Duration;

/// Substrings the retry policy treats as transient (spec §4.8 "Retries").
pub const DEFAULT_RETRYABLE_SUBSTRINGS: &[&str] = &[
    "timeout",
    "connection refused",
    "connection reset",
    "EOF",
    "rate limit",
    "throttled",
    "429",
    "503",
    "504",
];

/// Options for one `RunAll` invocation (spec §4.8).
#[derive(Debug, Clone)]
pub struct RunAllOptions {
    /// `terragrunt`/`terraform` (or any binary on `PATH`).
    pub binary: String,
    /// `plan`, `apply`, `destroy`, or an arbitrary subcommand.
    pub command: String,
    pub extra_args: Vec<String>,
    pub parallelism: usize,
    pub ignore_errors: bool,
    /// Flatten all modules into a single execution group.
    pub ignore_dependencies: bool,
    pub include_skipped: bool,
    pub target_modules: Vec<String>,
    pub exclude_modules: Vec<String>,
    pub per_module_timeout: Duration,
    pub dry_run: bool,
    pub auto_approve: bool,
    /// Disables prompts: sets `-input=false`/`TF_INPUT=false` and
    /// `TERRAGRUNT_NON_INTERACTIVE=true` (spec §6 "compatibility-critical").
    /// Defaults on — the executor has no terminal to prompt against.
    pub non_interactive: bool,
    /// `--terragrunt-log-level=<level>` (spec §6).
    pub log_level: String,
    /// `--terragrunt-iam-role=<role>` (spec §6). A per-module
    /// `TerragruntConfig.iam_role` overrides this when present.
    pub iam_role: Option<String>,
    pub env: HashMap<String, String>,
    pub retry_max_attempts: usize,
    pub retry_interval: Duration,
    pub retryable_substrings: Vec<String>,
}

impl Default for RunAllOptions {
    fn default() -> Self {
        Self {
            binary: "terragrunt".to_string(),
            command: "plan".to_string(),
            extra_args: Vec::new(),
            parallelism: 10,
            ignore_errors: false,
            ignore_dependencies: false,
            include_skipped: false,
            target_modules: Vec::new(),
            exclude_modules: Vec::new(),
            per_module_timeout: Duration::from_secs(30 * 60),
            dry_run: false,
            auto_approve: false,
            non_interactive: true,
            log_level: "info".to_string(),
            iam_role: None,
            env: HashMap::new(),
            retry_max_attempts: 0,
            retry_interval: Duration::from_secs(5),
            retryable_substrings: DEFAULT_RETRYABLE_SUBSTRINGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RunAllOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Whether a mutating command should get `-auto-approve` appended
    /// (spec §4.8 "auto-approve for mutating commands").
    pub fn is_mutating(&self) -> bool {
        matches!(self.command.as_str(), "apply" | "destroy")
    }

    /// Full argv following the compatibility-critical template (spec §6):
    /// `<cmd> [<args>...] [-auto-approve] [-input=false]
    /// --terragrunt-log-level=<level> [--terragrunt-iam-role=<role>]
    /// [--terragrunt-parallelism=<n>]`, with `-out=tfplan` appended for
    /// `plan`. `module_iam_role` is the invoked module's own
    /// `TerragruntConfig.iam_role`, if any, and takes precedence over
    /// `self.iam_role`.
    pub fn build_args(&self, module_iam_role: Option<&str>) -> Vec<String> {
        let mut args = vec![self.command.clone()];
        args.extend(self.extra_args.iter().cloned());

        if self.is_mutating() && self.auto_approve {
            args.push("-auto-approve".to_string());
        }
        if self.non_interactive {
            args.push("-input=false".to_string());
        }
        args.push(format!("--terragrunt-log-level={}", self.log_level));
        if let Some(role) = module_iam_role.or(self.iam_role.as_deref()) {
            args.push(format!("--terragrunt-iam-role={}", role));
        }
        if self.parallelism > 0 {
            args.push(format!("--terragrunt-parallelism={}", self.parallelism));
        }
        if self.command == "plan" {
            args.push("-out=tfplan".to_string());
        }
        args
    }

    pub fn is_retryable(&self, output: &str) -> bool {
        self.retry_max_attempts > 0
            && self
                .retryable_substrings
                .iter()
                .any(|needle| output.contains(needle.as_str()))
    }

    /// Filter a module path set by `target_modules`/`exclude_modules`
    /// (spec §4.8 step 1 "apply include/exclude filters").
    pub fn admits(&self, module_path: &str) -> bool {
        if !self.target_modules.is_empty() && !self.target_modules.iter().any(|p| p == module_path) {
            return false;
        }
        !self.exclude_modules.iter().any(|p| p == module_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutating_commands_get_auto_approve_when_enabled() {
        let mut opts = RunAllOptions::new("apply");
        opts.auto_approve = true;
        let args = opts.build_args(None);
        assert_eq!(
            args,
            vec![
                "apply".to_string(),
                "-auto-approve".to_string(),
                "-input=false".to_string(),
                "--terragrunt-log-level=info".to_string(),
                "--terragrunt-parallelism=10".to_string(),
            ]
        );
    }

    #[test]
    fn plan_never_gets_auto_approve() {
        let mut opts = RunAllOptions::new("plan");
        opts.auto_approve = true;
        let args = opts.build_args(None);
        assert!(!args.contains(&"-auto-approve".to_string()));
        assert_eq!(args.last(), Some(&"-out=tfplan".to_string()));
    }

    #[test]
    fn plan_gets_out_tfplan_appended_last() {
        let opts = RunAllOptions::new("plan");
        let args = opts.build_args(None);
        assert_eq!(
            args,
            vec![
                "plan".to_string(),
                "-input=false".to_string(),
                "--terragrunt-log-level=info".to_string(),
                "--terragrunt-parallelism=10".to_string(),
                "-out=tfplan".to_string(),
            ]
        );
    }

    #[test]
    fn module_iam_role_overrides_option_level_default() {
        let mut opts = RunAllOptions::new("plan");
        opts.iam_role = Some("arn:aws:iam::111111111111:role/default".to_string());
        let args = opts.build_args(Some("arn:aws:iam::222222222222:role/module"));
        assert!(args.contains(&"--terragrunt-iam-role=arn:aws:iam::222222222222:role/module".to_string()));
        assert!(!args.iter().any(|a| a.contains("111111111111")));
    }

    #[test]
    fn non_interactive_disabled_omits_input_false() {
        let mut opts = RunAllOptions::new("plan");
        opts.non_interactive = false;
        assert!(!opts.build_args(None).contains(&"-input=false".to_string()));
    }

    #[test]
    fn retry_disabled_by_default() {
        let opts = RunAllOptions::new("plan");
        assert!(!opts.is_retryable("connection reset by peer"));
    }

    #[test]
    fn target_and_exclude_filters() {
        let mut opts = RunAllOptions::new("plan");
        opts.target_modules = vec!["/root/a".into(), "/root/b".into()];
        assert!(opts.admits("/root/a"));
        assert!(!opts.admits("/root/c"));

        let mut opts2 = RunAllOptions::new("plan");
        opts2.exclude_modules = vec!["/root/b".into()];
        assert!(opts2.admits("/root/a"));
        assert!(!opts2.admits("/root/b"));
    }
}
