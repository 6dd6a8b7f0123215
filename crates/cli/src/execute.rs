use crate::commands::{affected, cache, projects, results, tasks};
use crate::commands::{CacheCommands, Commands, TaskCommands};
use ripple_config::{load_registry, RuntimeConfig};
use ripple_workspace::ProjectGraph;

impl Commands {
    /// Run the command and return the process exit code
    pub async fn execute(self, config: &RuntimeConfig) -> eyre::Result<i32> {
        match self {
            Commands::Projects { json } => projects::list(&load_graph(config)?, json),
            Commands::Deps { project, reverse } => {
                projects::deps(&load_graph(config)?, &project, reverse)
            }
            Commands::Graph { format } => projects::graph(&load_graph(config)?, format),
            Commands::Validate => projects::validate(&load_graph(config)?, config),
            Commands::Affected { change, json } => {
                affected::affected(config, &load_graph(config)?, &change, json)
            }
            Commands::Test { change, exec } => {
                affected::test(config, &load_graph(config)?, &change, &exec).await
            }
            Commands::Run { project } => projects::run(config, &load_graph(config)?, &project).await,
            Commands::Tasks { command } => match command {
                TaskCommands::List => tasks::list(config),
                TaskCommands::Run { names, exec } => tasks::run(config, &names, &exec).await,
            },
            Commands::Cache { command } => match command {
                CacheCommands::Clean => cache::clean(config),
                CacheCommands::Key { task, explain } => cache::key(config, &task, explain),
            },
            Commands::Results { json } => results::show(config, json),
        }
    }
}

/// Load the registry and build the project graph
fn load_graph(config: &RuntimeConfig) -> eyre::Result<ProjectGraph> {
    let projects = load_registry(&config.registry_path)?;
    tracing::debug!(projects = projects.len(), registry = %config.registry_path.display(), "registry loaded");
    Ok(ProjectGraph::new(projects))
}
