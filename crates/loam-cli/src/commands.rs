use clap::{Parser, Subcommand};

use loam_constants::{DEFAULT_HOST_PM, DESCRIPTION, VERSION};

#[derive(Parser)]
#[command(name = "loam")]
#[command(version = VERSION)]
#[command(propagate_version = true)]
#[command(about = DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Materializes the resolved graph in DIR into a node_modules tree
    #[command(aliases = ["m", "install", "i"])]
    Materialize {
        /// Project directory holding hash.json, resolved_graph.json and map.json
        #[arg(default_value = ".")]
        dir: String,
        /// Host package manager used to run postinstall hooks
        #[arg(long = "pm", default_value = DEFAULT_HOST_PM)]
        pm: String,
        /// Enable debug mode for verbose output
        #[arg(long)]
        debug: bool,
        /// Only print errors
        #[arg(short = 'q', long)]
        quiet: bool,
    },
    /// Removes the package store (and optionally node_modules) from DIR
    Clean {
        /// Project directory
        #[arg(default_value = ".")]
        dir: String,
        /// Also remove the project's node_modules directory
        #[arg(long)]
        links: bool,
        /// Enable debug mode for verbose output
        #[arg(long)]
        debug: bool,
        /// Only print errors
        #[arg(short = 'q', long)]
        quiet: bool,
    },
}
