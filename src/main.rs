//! GigNova CLI entry point.

use clap::Parser;

use gignova::cli::{Cli, Commands};
use gignova::infrastructure::config::ConfigLoader;
use gignova::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::extract(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => gignova::cli::handle_error(err, cli.json),
    };

    // An invalid level is reported by `config validate`; log at the default meanwhile.
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))
        .or_else(|_| LoggerImpl::init(&LogConfig::default()))
        .ok();

    let result = match cli.command {
        Commands::Simulate(args) => gignova::cli::commands::simulate::execute(args, &config, cli.json).await,
        Commands::Config(args) => gignova::cli::commands::config::execute(args, &config, cli.json),
    };

    if let Err(err) = result {
        gignova::cli::handle_error(err, cli.json);
    }
}
