mod shaders;
mod simulate;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wayfarer_common::ClientConfig;

#[derive(Parser)]
#[command(name = "wayfarer-cli", about = "CLI tool for wayfarer client core operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML client configuration; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and effective configuration
    Info,
    /// Replay a JSON file of timed server messages against a simulated clock
    Simulate {
        /// JSON array of `{ "at", "incremental", "reports" }` messages
        #[arg(short, long)]
        messages: PathBuf,
        /// Simulated wall-clock seconds to run
        #[arg(short, long, default_value = "5")]
        seconds: f64,
        /// Wall-clock seconds per frame
        #[arg(long, default_value = "0.5")]
        step: f64,
    },
    /// Build, bind and dispose demo shader programs on the headless backend
    Shaders {
        /// Log generated shader source
        #[arg(long)]
        dump: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("wayfarer-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("{config:#?}");
        }
        Commands::Simulate {
            messages,
            seconds,
            step,
        } => {
            let messages = simulate::load_messages(&messages)?;
            simulate::run(&config, messages, seconds, step)?;
        }
        Commands::Shaders { dump } => {
            config.render.dump_shaders |= dump;
            shaders::run(&config)?;
        }
    }

    Ok(())
}
