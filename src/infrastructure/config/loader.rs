use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

const ENV_PREFIX: &str = "GIGNOVA_";
const PROJECT_CONFIG: &str = ".gignova/config.yaml";
const LOCAL_CONFIG: &str = ".gignova/local.yaml";
const MAX_NEGOTIATION_ROUNDS: u32 = 50;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];
const ROTATIONS: [&str; 3] = ["daily", "hourly", "never"];
const EMBEDDING_PROVIDERS: [&str; 2] = ["hashing", "openai"];

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid threshold bounds [{0}, {1}]. Must satisfy 0 <= min < max <= 1")]
    InvalidBounds(f64, f64),

    #[error("Initial {stage} threshold {value} lies outside bounds [{min}, {max}]")]
    ThresholdOutOfBounds {
        stage: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid max_rounds: {0}. Must be between 1 and 50")]
    InvalidMaxRounds(u32),

    #[error("Invalid negotiation {0}: {1}. Must lie strictly between 0 and 1")]
    InvalidNegotiationFactor(&'static str, f64),

    #[error("Invalid collaborator timeout_ms: {0}. Must be positive")]
    InvalidTimeout(u64),

    #[error("Invalid candidate_limit: {0}. Must be at least 1")]
    InvalidCandidateLimit(usize),

    #[error("Invalid evolution {0}: {1}. Must be positive")]
    InvalidEvolutionStep(&'static str, f64),

    #[error("Invalid evolution {0}. Must be at least 1")]
    EmptyEvolutionWindow(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Unknown embedding provider: {0}. Must be one of: hashing, openai")]
    UnknownEmbeddingProvider(String),

    #[error("Invalid embedding dimension: {0}. Must be at least 1")]
    InvalidEmbeddingDimension(usize),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .gignova/config.yaml
    /// 3. .gignova/local.yaml (optional local overrides)
    /// 4. Environment variables (`GIGNOVA_*`, nested keys split on `__`)
    pub fn load() -> Result<Config> {
        let config = Self::extract(None)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load defaults, then the given file, then environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config = Self::extract(Some(path.as_ref()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Merge all layers without validating the result.
    ///
    /// With `file` set, that file replaces the two project YAML layers and
    /// must exist.
    pub fn extract(file: Option<&Path>) -> Result<Config> {
        if let Some(path) = file {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }
        Self::figment(file).extract().with_context(|| match file {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Failed to extract configuration from figment".to_string(),
        })
    }

    fn figment(file: Option<&Path>) -> Figment {
        let base = Figment::new().merge(Serialized::defaults(Config::default()));
        let with_files = match file {
            Some(path) => base.merge(Yaml::file(path)),
            None => base
                .merge(Yaml::file(PROJECT_CONFIG))
                .merge(Yaml::file(LOCAL_CONFIG)),
        };
        with_files.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let thresholds = &config.thresholds;
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(thresholds.min) && in_unit(thresholds.max)) || thresholds.min >= thresholds.max {
            return Err(ConfigError::InvalidBounds(thresholds.min, thresholds.max));
        }
        for (stage, value) in [
            ("matching", thresholds.matching_confidence),
            ("validation", thresholds.validation_similarity),
        ] {
            if !(thresholds.min..=thresholds.max).contains(&value) {
                return Err(ConfigError::ThresholdOutOfBounds {
                    stage,
                    value,
                    min: thresholds.min,
                    max: thresholds.max,
                });
            }
        }

        let negotiation = &config.negotiation;
        if negotiation.max_rounds == 0 || negotiation.max_rounds > MAX_NEGOTIATION_ROUNDS {
            return Err(ConfigError::InvalidMaxRounds(negotiation.max_rounds));
        }
        for (name, value) in [
            ("gap_tolerance", negotiation.gap_tolerance),
            ("offer_bias", negotiation.offer_bias),
            ("ask_concession", negotiation.ask_concession),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::InvalidNegotiationFactor(name, value));
            }
        }

        if config.matching.candidate_limit == 0 {
            return Err(ConfigError::InvalidCandidateLimit(0));
        }
        if config.collaborators.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(0));
        }

        let evolution = &config.evolution;
        for (name, value) in [
            ("raise_step", evolution.raise_step),
            ("lower_step", evolution.lower_step),
            ("error_tolerance", evolution.error_tolerance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidEvolutionStep(name, value));
            }
        }
        if evolution.window_size == 0 {
            return Err(ConfigError::EmptyEvolutionWindow("window_size"));
        }
        if evolution.window_days <= 0 {
            return Err(ConfigError::EmptyEvolutionWindow("window_days"));
        }
        if evolution.min_samples == 0 {
            return Err(ConfigError::EmptyEvolutionWindow("min_samples"));
        }
        if evolution.interval_secs == 0 {
            return Err(ConfigError::EmptyEvolutionWindow("interval_secs"));
        }

        if !EMBEDDING_PROVIDERS.contains(&config.embeddings.provider.as_str()) {
            return Err(ConfigError::UnknownEmbeddingProvider(
                config.embeddings.provider.clone(),
            ));
        }
        if config.embeddings.dimension == 0 {
            return Err(ConfigError::InvalidEmbeddingDimension(0));
        }

        let logging = &config.logging;
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(logging.level.clone()));
        }
        if !LOG_FORMATS.contains(&logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(logging.format.clone()));
        }
        if !ROTATIONS.contains(&logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(logging.rotation.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!((config.thresholds.matching_confidence - 0.7).abs() < f64::EPSILON);
        assert!((config.thresholds.validation_similarity - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.negotiation.max_rounds, 5);
        assert_eq!(config.collaborators.timeout_ms, 5000);
        assert_eq!(config.evolution.interval_secs, 604_800);
        assert_eq!(config.embeddings.provider, "hashing");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
thresholds:
  matching_confidence: 0.6
negotiation:
  max_rounds: 8
evolution:
  min_samples: 4
logging:
  level: debug
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert!((config.thresholds.matching_confidence - 0.6).abs() < f64::EPSILON);
        assert!((config.thresholds.validation_similarity - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.negotiation.max_rounds, 8);
        assert_eq!(config.evolution.min_samples, 4);
        assert_eq!(config.logging.level, "debug");
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_bounds() {
        let mut config = Config::default();
        config.thresholds.min = 0.9;
        config.thresholds.max = 0.9;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBounds(0.9, 0.9))
        );

        let mut config = Config::default();
        config.thresholds.max = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBounds(_, _))
        ));
    }

    #[test]
    fn test_validate_initial_threshold_outside_bounds() {
        let mut config = Config::default();
        config.thresholds.validation_similarity = 0.99;
        match ConfigLoader::validate(&config) {
            Err(ConfigError::ThresholdOutOfBounds { stage, .. }) => assert_eq!(stage, "validation"),
            other => panic!("Expected ThresholdOutOfBounds, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_max_rounds() {
        let mut config = Config::default();
        config.negotiation.max_rounds = 0;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxRounds(0)));
        config.negotiation.max_rounds = 51;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxRounds(51)));
    }

    #[test]
    fn test_validate_negotiation_factors() {
        let mut config = Config::default();
        config.negotiation.offer_bias = 1.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidNegotiationFactor("offer_bias", _))
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.collaborators.timeout_ms = 0;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::InvalidTimeout(0)));
    }

    #[test]
    fn test_validate_evolution() {
        let mut config = Config::default();
        config.evolution.lower_step = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidEvolutionStep("lower_step", _))
        ));

        let mut config = Config::default();
        config.evolution.min_samples = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyEvolutionWindow("min_samples"))
        );
    }

    #[test]
    fn test_validate_logging_and_provider() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel("loud".to_string()))
        );

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat("xml".to_string()))
        );

        let mut config = Config::default();
        config.embeddings.provider = "word2vec".to_string();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::UnknownEmbeddingProvider("word2vec".to_string()))
        );
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let file = yaml_file("negotiation:\n  max_rounds: 7\nlogging:\n  format: json\n");
        temp_env::with_vars(
            [
                ("GIGNOVA_NEGOTIATION__MAX_ROUNDS", Some("9")),
                ("GIGNOVA_THRESHOLDS__MATCHING_CONFIDENCE", Some("0.65")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.negotiation.max_rounds, 9, "env wins over file");
                assert!((config.thresholds.matching_confidence - 0.65).abs() < 1e-9);
                assert_eq!(config.logging.format, "json", "file value persists");
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let file = yaml_file("evolution:\n  window_size: 0\n");
        temp_env::with_vars_unset(["GIGNOVA_EVOLUTION__WINDOW_SIZE"], || {
            let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
            assert!(err.to_string().contains("window_size"));
        });
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(ConfigLoader::load_from_file("/nonexistent/gignova.yaml").is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = yaml_file("matching:\n  candidate_limit: 5\nlogging:\n  level: info\n  format: json\n");
        let overlay = yaml_file("matching:\n  candidate_limit: 15\nlogging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.path()))
            .merge(Yaml::file(overlay.path()))
            .extract()
            .unwrap();

        assert_eq!(config.matching.candidate_limit, 15, "Override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json", "Base value should persist");
    }
}
