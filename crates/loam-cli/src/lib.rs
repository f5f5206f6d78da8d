pub mod commands;
pub mod handlers;

use clap::Parser;

use commands::{Cli, Commands};
use handlers::{CleanHandler, MaterializeHandler};

pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Materialize {
            dir,
            pm,
            debug,
            quiet,
        } => {
            loam_logger::init_logger(*quiet);
            MaterializeHandler::run(dir, pm, *debug)?;
        }
        Commands::Clean {
            dir,
            links,
            debug,
            quiet,
        } => {
            loam_logger::init_logger(*quiet);
            CleanHandler::run(dir, *links, *debug)?;
        }
    }

    Ok(())
}
