//! corekit CLI: the `corekit` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    support::init_tracing();
    let cli = Cli::parse();
    let config = support::load_config_or_exit(cli.config.as_deref());

    match cli.command {
        Commands::Checks { json } => commands::checks::run(&config, json),

        Commands::Validate {
            value,
            instruction,
            json,
        } => commands::validate::run(&config, &value, &instruction, json),

        Commands::Describe { value, json } => commands::describe::run(&config, &value, json),

        Commands::Config { json } => commands::config::run(&config, json),
    }
}
