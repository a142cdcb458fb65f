mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    info!("gdata CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let result = match cli.command {
        Commands::Read(args) => {
            info!("Dispatching to 'read' command.");
            commands::read::run(args)
        }
        Commands::Merge(args) => {
            info!("Dispatching to 'merge' command.");
            commands::merge::run(args)
        }
        Commands::Info(args) => {
            info!("Dispatching to 'info' command.");
            commands::info::run(args)
        }
        Commands::ExportXyz(args) => {
            info!("Dispatching to 'export-xyz' command.");
            commands::export::run(args)
        }
        Commands::PrincipalAxes(args) => {
            info!("Dispatching to 'principal-axes' command.");
            commands::principal_axes::run(args)
        }
    };

    match &result {
        Ok(()) => info!("✅ Command completed successfully."),
        Err(e) => error!("❌ Command failed: {}", e),
    }
    result
}
