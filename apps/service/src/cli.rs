use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use skyprobe::Method;

#[derive(Debug, Parser)]
#[command(name = "skyprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-region synthetic HTTP probing", long_about = None)]
pub struct Cli {
    /// Controller config file (default: $XDG_CONFIG_HOME/skyprobe/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Dispatch one pass of a template
    Run(PassArgs),

    /// Dispatch passes every template interval until interrupted
    Watch {
        #[command(flatten)]
        pass: PassArgs,

        /// Stop after this many passes
        #[arg(long)]
        passes: Option<usize>,
    },

    /// Trace a single target from here and print the result
    Shoot(ShootArgs),

    /// Resolve a template and print the plan without dispatching
    Validate(PlanArgs),

    /// Print the controller configuration
    Config,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Template file (.toml or .json)
    pub template: PathBuf,

    /// Probe from every supported region in addition to the template's
    #[arg(long)]
    pub all_regions: bool,
}

#[derive(Debug, Args)]
pub struct PassArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Run probes in this process instead of invoking regional workers
    #[arg(long)]
    pub local: bool,
}

#[derive(Debug, Args)]
pub struct ShootArgs {
    pub url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    pub method: Method,

    #[arg(short, long)]
    pub port: Option<String>,

    /// Timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// JSON body field as key=value, repeatable
    #[arg(short, long = "body", value_parser = parse_key_value)]
    pub body: Vec<(String, String)>,

    /// Request header as key=value, repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_key_value)]
    pub header: Vec<(String, String)>,
}

impl ShootArgs {
    pub fn body_map(&self) -> Option<BTreeMap<String, String>> {
        (!self.body.is_empty()).then(|| self.body.iter().cloned().collect())
    }

    pub fn header_map(&self) -> Option<BTreeMap<String, String>> {
        (!self.header.is_empty()).then(|| self.header.iter().cloned().collect())
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| anyhow!("expected key=value, got {raw}"))?;
    if key.is_empty() {
        return Err(anyhow!("empty key in {raw}"));
    }
    Ok((key.to_string(), value.to_string()))
}
