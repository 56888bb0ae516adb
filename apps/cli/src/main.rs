//! Cinelayer CLI: layered movie-dataset refinement.
//!
//! Turns a raw movie export into bronze, silver and gold snapshots and
//! prints the reporting views computed over the gold table.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
