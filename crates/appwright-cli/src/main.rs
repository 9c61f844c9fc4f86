mod build_cmds;
mod config;
mod serve_cmd;
mod spec_cmds;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use appwright_core::provider::{AnthropicProvider, GenerationClient};

use config::AppwrightConfig;

#[derive(Parser)]
#[command(name = "appwright", about = "Spec-to-app build pipeline")]
struct Cli {
    /// Artifact store root (overrides APPWRIGHT_DATA_DIR env var)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an appwright config file
    Init {
        /// Provider API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Mint a fresh project id
    New,
    /// Merge one intent into a project's living spec
    Merge {
        /// Project id
        project_id: String,
        /// Intent JSON, e.g. '{"type": "feature_request", "data": "Add login page"}'
        intent: Option<String>,
        /// Read the intent JSON from a file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Snapshot the living spec for building
    Freeze {
        /// Project id
        project_id: String,
    },
    /// Synthesize a plan from the frozen spec
    Plan {
        /// Project id
        project_id: String,
        /// Extra free-text guidance for the planner
        #[arg(long)]
        context: Option<String>,
    },
    /// Generate code files from the persisted plan
    Generate {
        /// Project id
        project_id: String,
    },
    /// Full build: plan, then code, then optional deploy
    Build {
        /// Project id
        project_id: String,
        /// Extra free-text guidance for the planner
        #[arg(long)]
        context: Option<String>,
        /// Provision a remote repository and push the workspace
        #[arg(long)]
        deploy: bool,
    },
    /// Show a project's pipeline stage and artifacts
    Status {
        /// Project id
        project_id: String,
    },
    /// Serve the HTTP facade
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

/// Execute `appwright init`: write the config file.
fn cmd_init(api_key: Option<String>, force: bool) -> Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        provider: config::ProviderSection {
            api_key,
            model: None,
        },
        ..Default::default()
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    match &cfg.provider.api_key {
        Some(_) => println!("  provider.api_key = <stored>"),
        None => println!("  provider.api_key unset; set ANTHROPIC_API_KEY or edit the file"),
    }
    println!();
    println!("Next: `appwright new`, then merge intents and `appwright build <id>`.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppwrightConfig::resolve(cli.data_dir.as_deref());

    match cli.command {
        Commands::Init { api_key, force } => cmd_init(api_key, force),
        Commands::New => spec_cmds::cmd_new(),
        Commands::Merge {
            project_id,
            intent,
            file,
        } => spec_cmds::cmd_merge(&cfg.layout, &project_id, intent.as_deref(), file.as_deref()),
        Commands::Freeze { project_id } => spec_cmds::cmd_freeze(&cfg.layout, &project_id),
        Commands::Plan {
            project_id,
            context,
        } => build_cmds::cmd_plan(&cfg, &project_id, context.as_deref()).await,
        Commands::Generate { project_id } => build_cmds::cmd_generate(&cfg, &project_id).await,
        Commands::Build {
            project_id,
            context,
            deploy,
        } => build_cmds::cmd_build(&cfg, &project_id, context.as_deref(), deploy).await,
        Commands::Status { project_id } => spec_cmds::cmd_status(&cfg.layout, &project_id),
        Commands::Serve { port } => {
            let client = GenerationClient::new(AnthropicProvider::new(cfg.provider()?));
            let state = serve_cmd::ServeState {
                layout: cfg.layout.clone(),
                client,
            };
            serve_cmd::run(state, port).await
        }
    }
}
