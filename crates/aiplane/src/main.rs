mod commands;
mod manifest;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aiplane")]
#[command(about = "Declarative management of AI-platform projects, keys, invites and jobs", long_about = None)]
struct Cli {
    /// Configuration file (default: aiplane.yaml discovery)
    #[arg(short, long, global = true, env = "AIPLANE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List manageable resource types and their capabilities
    Resources,
    /// List remote objects of a type
    List {
        /// Resource type (e.g. project, invite, file)
        resource_type: String,
        /// Parent identity or query filter, as key=value (repeatable)
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Page size (1-100)
        #[arg(short, long, default_value = "20")]
        limit: u32,
        /// Sort order
        #[arg(long, default_value = "desc", value_parser = ["asc", "desc"])]
        order: String,
        /// Start after this cursor
        #[arg(long, conflicts_with = "before")]
        after: Option<String>,
        /// Page backwards from this cursor
        #[arg(long)]
        before: Option<String>,
        /// Print raw JSON objects, one per line
        #[arg(long)]
        json: bool,
        /// Credential override for this call
        #[arg(long, env = "AIPLANE_KEY", hide_env_values = true)]
        key: Option<String>,
    },
    /// Adopt an existing remote object into a state file
    Import {
        resource_type: String,
        /// Remote id; composite ids are written parent:child
        id: String,
        /// Local name in the state file (defaults to the id)
        #[arg(short, long)]
        name: Option<String>,
        /// State file to extend
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Where to write the resulting state (defaults to --state)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long, env = "AIPLANE_KEY", hide_env_values = true)]
        key: Option<String>,
    },
    /// Show the actions an apply would take, without calling the API
    Plan {
        /// Manifest of desired resources (YAML)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Previously observed state (JSON)
        #[arg(short, long)]
        state: Option<PathBuf>,
    },
    /// Converge remote resources to the manifest
    Apply {
        #[arg(short, long)]
        manifest: PathBuf,
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Where to write the resulting state (defaults to --state)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show version information
    Version,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("aiplane {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Resources => commands::resources::handle(),
        Commands::Plan { manifest, state } => commands::plan::handle(&manifest, state.as_deref()),
        Commands::List {
            resource_type,
            filters,
            limit,
            order,
            after,
            before,
            json,
            key,
        } => {
            let ctx = utils::Context::load(cli.config.as_deref())?;
            let args = commands::list::ListArgs {
                resource_type,
                filters,
                limit,
                order,
                after,
                before,
                json,
                key,
            };
            commands::list::handle(&ctx, args).await
        }
        Commands::Import {
            resource_type,
            id,
            name,
            state,
            out,
            key,
        } => {
            let ctx = utils::Context::load(cli.config.as_deref())?;
            let out = out.or_else(|| state.clone());
            commands::import::handle(
                &ctx,
                &resource_type,
                &id,
                name,
                state.as_deref(),
                out.as_deref(),
                key.as_deref(),
            )
            .await
        }
        Commands::Apply {
            manifest,
            state,
            out,
        } => {
            let ctx = utils::Context::load(cli.config.as_deref())?;
            let out = out.or_else(|| state.clone());
            commands::apply::handle(&ctx, &manifest, state.as_deref(), out.as_deref()).await
        }
    }
}
