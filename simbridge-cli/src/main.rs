use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod demo;
mod utils;

use commands::serve::ServeArgs;

/// simbridge - stream simulation telemetry to a single WebSocket peer
#[derive(Parser)]
#[command(name = "simbridge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge with the demo position producer
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config {
        /// Load configuration from this file instead of the standard locations
        #[arg(short, long, value_name = "PATH")]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args).await,
        Commands::Config { config } => commands::config::execute(config.as_deref()),
    };

    // Handle result
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // Show context if available
            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
