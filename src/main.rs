//! Packsmith - declarative package build compiler
//!
//! A command line frontend over the packsmith library: load a build spec,
//! route the requested target, and materialize the output tree.

use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build(args) => commands::build::run(args),
        Commands::Targets(args) => commands::targets::run(args),
        Commands::Version => commands::version::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
