//! Implementation of the `gignova config` commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration after all layers are merged
    Show,
    /// Check the effective configuration and report the first problem found
    Validate,
}

#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_else(|e| format!("<unprintable config: {e}>"))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValidateOutput {
    pub valid: bool,
    pub error: Option<String>,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        match &self.error {
            None => format!("{} configuration is valid", console::style("ok:").green().bold()),
            Some(err) => format!("{} {err}", console::style("invalid:").red().bold()),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// `config` runs on the already-loaded configuration; loading itself fails
/// earlier on a malformed file.
pub fn execute(args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            output(&ConfigShowOutput { config: config.clone() }, json_mode);
        }
        ConfigCommands::Validate => {
            let error = ConfigLoader::validate(config).err().map(|e| e.to_string());
            let result = ConfigValidateOutput {
                valid: error.is_none(),
                error,
            };
            output(&result, json_mode);
            if !result.valid {
                anyhow::bail!("configuration is invalid");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output_reports_error() {
        let mut config = Config::default();
        config.negotiation.max_rounds = 0;
        let args = ConfigArgs {
            command: ConfigCommands::Validate,
        };
        assert!(execute(args, &config, true).is_err());
    }

    #[test]
    fn test_show_round_trips_through_json() {
        let out = ConfigShowOutput {
            config: Config::default(),
        };
        let json = out.to_json();
        assert_eq!(json["negotiation"]["max_rounds"], 5);
        assert_eq!(json["embeddings"]["provider"], "hashing");
    }
}
