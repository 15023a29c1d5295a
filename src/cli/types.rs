//! CLI type definitions
//!
//! Clap structures that define the command surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::config::ConfigArgs;
use crate::cli::commands::simulate::SimulateArgs;

#[derive(Parser, Debug)]
#[command(name = "gignova")]
#[command(about = "GigNova - autonomous job lifecycle orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file; defaults to .gignova/config.yaml layered with local.yaml
    #[arg(short, long, global = true, env = "GIGNOVA_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted scenario through the orchestrator with local collaborators
    Simulate(SimulateArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}
