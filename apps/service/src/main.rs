#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod commands;
mod config;
mod template;

use cli::{Cli, Command};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("failed to load configuration")?;

    logger::init_with_level(logger::parse_level(&config.log_level));

    match &cli.command {
        Command::Run(args) => commands::run(&config, args).await,
        Command::Watch { pass, passes } => commands::watch(&config, pass, *passes).await,
        Command::Shoot(args) => commands::shoot(&config, args).await,
        Command::Validate(args) => commands::validate(&config, args),
        Command::Config => {
            print!("{config}");
            Ok(())
        }
    }
}
