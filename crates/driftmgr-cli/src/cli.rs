use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "driftmgr",
    about = "Cloud infrastructure drift detection and Terragrunt run-all orchestration",
    version
)]
pub struct Cli {
    /// Output format for command results.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover live resources from one or more cloud providers.
    Discover {
        /// Providers to query (aws, azure, gcp, digitalocean, local). All
        /// registered providers are queried when omitted. `local` is only
        /// registered when `--local-fixture` is given.
        #[arg(long, value_delimiter = ',')]
        providers: Vec<String>,

        /// Regions to scope the query to. Adapter-specific; ignored by
        /// globally-scoped resource families.
        #[arg(long, value_delimiter = ',')]
        regions: Vec<String>,

        /// Path to a JSON fixture file; registers the `local` provider
        /// against it. Omit to leave `local` unregistered.
        #[arg(long)]
        local_fixture: Option<PathBuf>,
    },

    /// Detect and summarise drift between recorded state and live resources.
    Drift {
        #[command(subcommand)]
        command: DriftCommand,
    },

    /// Parse and execute commands across a Terragrunt module tree.
    Terragrunt {
        #[command(subcommand)]
        command: TerragruntCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum DriftCommand {
    /// Compare a JSON file of recorded `Resource` state against freshly
    /// discovered live resources and report drift.
    Detect {
        /// Path to a JSON array of `Resource` records representing the
        /// last-known-good state.
        #[arg(long)]
        state: PathBuf,

        #[arg(long, value_delimiter = ',')]
        providers: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        regions: Vec<String>,

        /// Number of top-drifted resources to report in the summary.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Path to a JSON fixture file; registers the `local` provider
        /// against it. Omit to leave `local` unregistered.
        #[arg(long)]
        local_fixture: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum TerragruntCommand {
    /// Resolve dependencies under `dir` and run `command` across every
    /// module, group by group, in dependency order.
    RunAll {
        /// Root directory to recursively search for `terragrunt.hcl` files.
        dir: PathBuf,

        /// The terragrunt/terraform subcommand to run, e.g. `plan`, `apply`.
        command: String,

        #[arg(long, default_value = "terragrunt")]
        binary: String,

        #[arg(long, default_value_t = 10)]
        parallelism: usize,

        #[arg(long)]
        ignore_errors: bool,

        #[arg(long)]
        ignore_dependencies: bool,

        #[arg(long)]
        include_skipped: bool,

        #[arg(long, value_delimiter = ',')]
        target: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        auto_approve: bool,

        /// Per-module timeout in seconds.
        #[arg(long, default_value_t = 1800)]
        timeout_secs: u64,

        #[arg(long, default_value_t = 0)]
        retry_max_attempts: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
