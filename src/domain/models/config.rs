use serde::{Deserialize, Serialize};

use super::negotiation::NegotiationParams;
use super::thresholds::{StageThresholds, ThresholdBounds};

/// Main configuration structure for GigNova
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Initial adaptive thresholds and their bounds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Bracket-convergence parameters
    #[serde(default)]
    pub negotiation: NegotiationConfig,

    /// Matching stage configuration
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Collaborator call configuration
    #[serde(default)]
    pub collaborators: CollaboratorConfig,

    /// Evolution loop configuration
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Threshold configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ThresholdConfig {
    /// Initial minimum search score for a match
    #[serde(default = "default_matching_confidence")]
    pub matching_confidence: f64,

    /// Initial minimum artifact similarity for validation to pass
    #[serde(default = "default_validation_similarity")]
    pub validation_similarity: f64,

    /// Lowest value evolution may move a threshold to
    #[serde(default = "default_min_threshold")]
    pub min: f64,

    /// Highest value evolution may move a threshold to
    #[serde(default = "default_max_threshold")]
    pub max: f64,
}

const fn default_matching_confidence() -> f64 {
    0.7
}

const fn default_validation_similarity() -> f64 {
    0.8
}

const fn default_min_threshold() -> f64 {
    0.5
}

const fn default_max_threshold() -> f64 {
    0.95
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            matching_confidence: default_matching_confidence(),
            validation_similarity: default_validation_similarity(),
            min: default_min_threshold(),
            max: default_max_threshold(),
        }
    }
}

impl ThresholdConfig {
    pub const fn bounds(&self) -> ThresholdBounds {
        ThresholdBounds {
            min: self.min,
            max: self.max,
        }
    }

    /// Initial snapshot built from this configuration.
    pub fn initial(&self) -> StageThresholds {
        StageThresholds::new(self.matching_confidence, self.validation_similarity, self.bounds())
    }
}

/// Negotiation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NegotiationConfig {
    /// Round limit before giving up
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Relative gap at which the parties settle
    #[serde(default = "default_gap_tolerance")]
    pub gap_tolerance: f64,

    /// Requester's step toward the midpoint each round
    #[serde(default = "default_offer_bias")]
    pub offer_bias: f64,

    /// Counterparty's concession toward the midpoint each round
    #[serde(default = "default_ask_concession")]
    pub ask_concession: f64,
}

const fn default_max_rounds() -> u32 {
    5
}

const fn default_gap_tolerance() -> f64 {
    0.15
}

const fn default_offer_bias() -> f64 {
    0.7
}

const fn default_ask_concession() -> f64 {
    0.3
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            gap_tolerance: default_gap_tolerance(),
            offer_bias: default_offer_bias(),
            ask_concession: default_ask_concession(),
        }
    }
}

impl NegotiationConfig {
    pub const fn params(&self) -> NegotiationParams {
        NegotiationParams {
            max_rounds: self.max_rounds,
            gap_tolerance: self.gap_tolerance,
            offer_bias: self.offer_bias,
            ask_concession: self.ask_concession,
        }
    }
}

/// Matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MatchingConfig {
    /// Number of candidates requested from the search index
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
}

const fn default_candidate_limit() -> usize {
    10
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
        }
    }
}

/// Collaborator call configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollaboratorConfig {
    /// Deadline for every search, ledger, storage, and embedding call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    5000
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CollaboratorConfig {
    pub const fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Evolution loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvolutionConfig {
    /// Seconds between scheduled runs (default weekly)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Most recent outcomes considered per stage
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Oldest outcome age considered, in days
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Resolved outcomes required before a threshold may move
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Step applied when false positives dominate
    #[serde(default = "default_raise_step")]
    pub raise_step: f64,

    /// Step applied when false negatives dominate
    #[serde(default = "default_lower_step")]
    pub lower_step: f64,

    /// Error rate at or below which the threshold is left alone
    #[serde(default = "default_error_tolerance")]
    pub error_tolerance: f64,

    /// Run once immediately when the daemon starts
    #[serde(default)]
    pub run_on_startup: bool,
}

const fn default_interval_secs() -> u64 {
    7 * 24 * 3600
}

const fn default_window_size() -> usize {
    100
}

const fn default_window_days() -> i64 {
    30
}

const fn default_min_samples() -> usize {
    10
}

const fn default_raise_step() -> f64 {
    0.05
}

const fn default_lower_step() -> f64 {
    0.02
}

const fn default_error_tolerance() -> f64 {
    0.2
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            window_size: default_window_size(),
            window_days: default_window_days(),
            min_samples: default_min_samples(),
            raise_step: default_raise_step(),
            lower_step: default_lower_step(),
            error_tolerance: default_error_tolerance(),
            run_on_startup: false,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingsConfig {
    /// Provider: hashing or openai
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Vector dimension for the hashing provider
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Model name for the openai provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "hashing".to_string()
}

const fn default_dimension() -> usize {
    256
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            dimension: default_dimension(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
