//! Farmhand CLI: resolve, render and cook recipes on this node.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "farmhand",
    version,
    about = "Configuration-management agent core: recipes, ingredients and a content-addressed cache"
)]
struct Cli {
    /// Config file (default: /etc/farmhand/farmhand.yaml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: farmhand::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    farmhand::logging::init();
    if let Err(e) = farmhand::cli::dispatch(cli.config.as_deref(), cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
