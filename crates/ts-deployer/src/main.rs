//! thingstack: declare, plan and provision an IoT device stack.
//!
//! Loads a TOML stack description, builds the resource graph, and either
//! prints it (`synth`, `plan`) or applies it against AWS (`deploy`,
//! `destroy`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ts_deployer::{DeployerConfig, Deployer};
use ts_graph::build_stack;
use ts_model::StaticCredential;
use ts_provider::AwsProvider;

#[derive(Parser)]
#[command(name = "thingstack")]
#[command(version)]
#[command(about = "Provision an AWS IoT thing, its policy and its topic trigger", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "THINGSTACK_CONFIG", default_value = "thingstack.toml")]
    config: PathBuf,

    /// Report format for deploy and destroy (text, json)
    #[arg(long, env = "THINGSTACK_FORMAT", default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the synthesized template
    Synth,
    /// Print the provisioning order
    Plan,
    /// Create every resource that does not exist yet
    Deploy,
    /// Delete every resource of the stack, dependents first
    Destroy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "thingstack starting"
    );

    // ── Load config ─────────────────────────────────────────────
    let config = DeployerConfig::from_file(&cli.config)?;
    tracing::info!(
        region = %config.stack.region,
        variant = ?config.stack.variant,
        thing = %config.stack.thing_name,
        "config loaded"
    );

    // ── Build graph ─────────────────────────────────────────────
    let credentials = StaticCredential::new(&config.stack.certificate_arn);
    let graph = build_stack(&config.stack, &credentials)?;

    match cli.command {
        Commands::Synth => {
            println!("{}", graph.synth().to_pretty_string()?);
        }
        Commands::Plan => {
            print!("{}", graph.plan()?);
        }
        Commands::Deploy | Commands::Destroy => {
            let provider = AwsProvider::from_config(&config.aws, config.region()).await;
            let deployer = Deployer::new(&provider);

            let report = if matches!(cli.command, Commands::Deploy) {
                deployer.deploy(&graph).await?
            } else {
                deployer.destroy(&graph).await?
            };
            match cli.format {
                OutputFormat::Text => print!("{report}"),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
    }

    tracing::info!("thingstack finished");
    Ok(())
}
