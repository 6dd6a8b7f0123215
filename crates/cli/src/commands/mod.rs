use clap::{Args, Subcommand, ValueEnum};
use ripple_workspace::GraphFormat;

pub mod affected;
pub mod cache;
pub mod projects;
pub mod results;
pub mod tasks;

#[derive(Subcommand)]
pub enum Commands {
    /// List registered projects
    Projects {
        /// Print the registry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a project's dependencies or dependents
    Deps {
        /// Project name
        project: String,
        /// List projects that depend on this one instead
        #[arg(long)]
        reverse: bool,
    },
    /// Render the project graph
    Graph {
        /// Output format (text, ansi, dot, mermaid)
        #[arg(long, default_value = "text", value_parser = parse_graph_format)]
        format: GraphFormat,
    },
    /// Check the registry for unknown deps, missing test paths and cycles
    Validate,
    /// Print the projects affected by a change
    Affected {
        #[command(flatten)]
        change: ChangeArgs,
        /// Print the affected set as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the tests of affected projects
    Test {
        #[command(flatten)]
        change: ChangeArgs,
        #[command(flatten)]
        exec: ExecArgs,
    },
    /// Run a project's run target
    Run {
        /// Project name
        project: String,
    },
    /// Configured tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Output cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Show the last recorded run
    Results {
        /// Print the recorded summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List configured tasks in dependency order
    List,
    /// Run tasks and everything they depend on
    Run {
        /// Task names or aliases
        #[arg(required = true)]
        names: Vec<String>,
        #[command(flatten)]
        exec: ExecArgs,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove the local cache directory
    Clean,
    /// Print a task's cache key
    Key {
        /// Task name or alias
        task: String,
        /// Also list what went into the key
        #[arg(long)]
        explain: bool,
    },
}

/// Where the changed files come from
#[derive(Args, Debug, Clone, Default)]
pub struct ChangeArgs {
    /// Git reference to diff against
    #[arg(long)]
    pub base: Option<String>,
    /// Take the base from somewhere else (`last` reuses the previous base)
    #[arg(long, value_parser = ["last"], conflicts_with = "base")]
    pub base_from: Option<String>,
    /// Diff from the merge base of the base reference and HEAD
    #[arg(long)]
    pub merge_base: bool,
    /// Use files changed within a time window instead (e.g. "2 days ago")
    #[arg(long)]
    pub since: Option<String>,
    /// Skip diffing and select every project with tests
    #[arg(long)]
    pub no_diff: bool,
}

/// How a batch of work items is executed
#[derive(Args, Debug, Clone, Default)]
pub struct ExecArgs {
    /// Worker count; 1 runs serially (defaults to the configured value)
    #[arg(long)]
    pub parallel: Option<usize>,
    /// Extra attempts for failing items (defaults to the configured value)
    #[arg(long)]
    pub retries: Option<u32>,
    /// Keep running independent items after a failure
    #[arg(long)]
    pub keep_going: bool,
    /// Cache mode
    #[arg(long, value_enum, default_value_t = CacheArg::Off)]
    pub cache: CacheArg,
    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheArg {
    /// Never consult the cache
    #[default]
    Off,
    /// Local cache directory
    Local,
    /// The configured remote cache
    Remote,
    /// Fetch only; never execute or store
    RestoreOnly,
}

fn parse_graph_format(value: &str) -> Result<GraphFormat, String> {
    value.parse().map_err(|e: ripple_core::Error| e.to_string())
}
