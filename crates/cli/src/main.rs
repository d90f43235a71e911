//! Stepwise CLI, the main entry point.
//!
//! Commands:
//! - `run`     Run one task through the agent, step by step
//! - `tools`   List the built-in tools
//! - `config`  Show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: step-bounded, tool-calling AI agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task and print one line per step
    Run {
        /// The task for the agent
        prompt: String,

        /// Print steps as they happen instead of after the run
        #[arg(short, long)]
        stream: bool,

        /// Agent profile (defaults to agent.profile in the config)
        #[arg(short, long)]
        profile: Option<String>,

        /// Override the profile's step budget
        #[arg(long)]
        max_steps: Option<u32>,

        /// Seconds a streaming run may stay silent before it is cancelled
        #[arg(long)]
        idle_timeout: Option<u64>,
    },

    /// List the built-in tools
    Tools,

    /// Show the effective configuration
    Config {
        /// Print the default configuration instead
        #[arg(long)]
        default: bool,

        /// Print the config file path only
        #[arg(long, conflicts_with = "default")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so step lines stay on stdout
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Run {
            prompt,
            stream,
            profile,
            max_steps,
            idle_timeout,
        } => {
            commands::run::run(commands::run::RunArgs {
                prompt,
                stream,
                profile,
                max_steps,
                idle_timeout,
            })
            .await?
        }
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { default, path } => {
            if path {
                commands::config_cmd::path().await?
            } else if default {
                commands::config_cmd::default().await?
            } else {
                commands::config_cmd::show().await?
            }
        }
    }

    Ok(())
}
