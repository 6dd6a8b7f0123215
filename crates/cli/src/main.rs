use clap::Parser;
use ripple_config::{Adapter, ConfigLoader, RuntimeOptions};
use std::path::PathBuf;

mod commands;
mod execute;
mod output;
mod pipeline;

use commands::Commands;

#[derive(Parser)]
#[command(name = "ripple")]
#[command(about = "Run the tests and tasks affected by a change, with a shared output cache", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository root (defaults to $RIPPLE_ROOT or the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (defaults to ripple.toml or .ripple.toml in the root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project registry file
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Remote cache location: http(s)://... or s3://bucket/prefix
    #[arg(long, global = true)]
    cache_url: Option<String>,

    /// Command adapter (shell, mock)
    #[arg(long, global = true, value_parser = parse_adapter)]
    adapter: Option<Adapter>,

    /// Never write state, results or the local cache
    #[arg(long, global = true)]
    no_write: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            root: self.root.clone(),
            config_path: self.config.clone(),
            registry: self.registry.clone(),
            cache_url: self.cache_url.clone(),
            adapter: self.adapter,
            parallel: None,
            retries: None,
            no_write: self.no_write,
        }
    }
}

fn parse_adapter(value: &str) -> Result<Adapter, String> {
    value.parse().map_err(|e: ripple_core::Error| e.to_string())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if let Err(e) = ripple_utils::tracing::init(cli.verbose) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    let config = ConfigLoader::new().options(cli.runtime_options()).load()?;
    tracing::debug!(root = %config.root.display(), adapter = %config.adapter, "configuration loaded");

    let code = cli.command.execute(&config).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
