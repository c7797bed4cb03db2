use praetor_policy::EncoderOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Upper bound accepted for `max_policy_bytes`.
pub const MAX_POLICY_BYTES_LIMIT: usize = 64 * 1024 * 1024;

/// Configuration for compiling and loading policy sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Allow the optimizer to build switch tables.
    #[serde(default = "default_switch_optimization")]
    pub switch_optimization: bool,

    /// Minimum number of switch-eligible items before a table is built.
    #[serde(default = "default_min_switch_cases")]
    pub min_switch_cases: usize,

    /// Size limit when loading an encoded policy set.
    #[serde(default = "default_max_policy_bytes")]
    pub max_policy_bytes: usize,
}

fn default_switch_optimization() -> bool {
    true
}

fn default_min_switch_cases() -> usize {
    2
}

fn default_max_policy_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            switch_optimization: default_switch_optimization(),
            min_switch_cases: default_min_switch_cases(),
            max_policy_bytes: default_max_policy_bytes(),
        }
    }
}

impl From<&DecisionConfig> for EncoderOptions {
    fn from(config: &DecisionConfig) -> Self {
        EncoderOptions {
            switch_optimization: config.switch_optimization,
            min_switch_cases: config.min_switch_cases,
        }
    }
}

/// Configuration for the enforcement point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Run advice bodies after a decision.
    #[serde(default = "default_execute_advice")]
    pub execute_advice: bool,
}

fn default_execute_advice() -> bool {
    true
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            execute_advice: default_execute_advice(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "praetor=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Top-level configuration for the praetor binary.
///
/// Loaded from a TOML file (typically `~/.praetor/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PraetorConfig {
    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub enforcement: EnforcementConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl PraetorConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: PraetorConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.decision.min_switch_cases < 2 {
            return Err(RootError::Config(format!(
                "min_switch_cases must be >= 2, got {}",
                self.decision.min_switch_cases
            )));
        }
        if self.decision.max_policy_bytes == 0
            || self.decision.max_policy_bytes > MAX_POLICY_BYTES_LIMIT
        {
            return Err(RootError::Config(format!(
                "max_policy_bytes must be between 1 and {}, got {}",
                MAX_POLICY_BYTES_LIMIT, self.decision.max_policy_bytes
            )));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(RootError::Config("logging filter must not be empty".into()));
        }
        Ok(())
    }

    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions::from(&self.decision)
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".praetor/config.toml")
    }
}
