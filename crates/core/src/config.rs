use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Settings for the confirmation engine, the `[security]` table in
/// `squall.toml`. Consumed once at coordinator construction; pattern lists
/// are merged into the pattern registry and the session policy store at
/// startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// Prompt before running MEDIUM-tier commands
    pub require_confirmation_for_risky: bool,

    /// Prompt before running HIGH-tier commands
    pub require_confirmation_for_dangerous: bool,

    /// Permit HIGH-tier commands at all (they still prompt)
    pub allow_dangerous: bool,

    /// Hard deadline for a spawned process, in milliseconds
    pub max_execution_time_ms: u64,

    /// Deadline for an unanswered confirmation prompt, in milliseconds
    pub confirmation_timeout_ms: u64,

    /// Commands trusted for the session at startup (no prompt, category kept)
    pub trusted_commands: Vec<String>,

    /// Commands merged into the SAFE tier of the registry
    pub allowed_commands: Vec<String>,

    /// Commands merged into the BLOCKED tier (absolute, cannot be trusted away)
    pub blocked_commands: Vec<String>,

    /// Regex patterns seeding session trust entries
    pub auto_approve_patterns: Vec<String>,

    /// Regex patterns that behave like BLOCKED-tier entries
    pub always_block_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_confirmation_for_risky: true,
            require_confirmation_for_dangerous: true,
            allow_dangerous: false,
            max_execution_time_ms: 120_000,
            confirmation_timeout_ms: 30_000,
            trusted_commands: Vec::new(),
            allowed_commands: Vec::new(),
            blocked_commands: Vec::new(),
            auto_approve_patterns: Vec::new(),
            always_block_patterns: Vec::new(),
        }
    }
}

impl SecurityConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn max_execution_time(&self) -> Duration {
        Duration::from_millis(self.max_execution_time_ms)
    }

    /// Validate operator-supplied values. Malformed regexes are rejected
    /// here so the classifier never sees an uncompilable pattern.
    pub fn validate(&self) -> Result<()> {
        use crate::Error;

        if self.confirmation_timeout_ms == 0 {
            return Err(Error::Configuration(
                ConfigError::InvalidTimeout("confirmation_timeout_ms must be positive".to_string())
                    .to_string(),
            ));
        }
        if self.max_execution_time_ms == 0 {
            return Err(Error::Configuration(
                ConfigError::InvalidTimeout("max_execution_time_ms must be positive".to_string())
                    .to_string(),
            ));
        }

        for pattern in self.auto_approve_patterns.iter().chain(&self.always_block_patterns) {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(Error::Configuration(
                    ConfigError::InvalidPattern { pattern: pattern.clone(), reason: e.to_string() }
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// The `[logging]` table. Bridged into the tracing bootstrap by
/// `logging::init_logging`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default log level for stderr output (overridden by `SQUALL_LOG`)
    pub level: String,
    /// Output format: "pretty", "json", or "compact"
    pub format: String,
    /// File logging (rolled daily under the log directory)
    pub file: FileLoggingSettings,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: "pretty".to_string(), file: FileLoggingSettings::default() }
    }
}

/// File output section of `[logging]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileLoggingSettings {
    pub enabled: bool,
}

/// Root configuration structure for squall.toml
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub security: SecurityConfig,
    pub logging: LoggingSettings,
}

impl Config {
    /// Load configuration from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).map_err(|e| {
            crate::Error::Configuration(ConfigError::TomlParse(e.to_string()).to_string())
        })?;
        config.security.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Get example configuration (as a string)
    pub fn example() -> &'static str {
        r#"# Squall Configuration Example
# Copy this file to squall.toml and customize as needed

[security]
# Prompt before MEDIUM-tier (risky) commands
require_confirmation_for_risky = true
# Prompt before HIGH-tier (dangerous) commands
require_confirmation_for_dangerous = true
# Permit HIGH-tier commands at all
allow_dangerous = false
# Hard deadline for a spawned process (ms)
max_execution_time_ms = 120000
# Deadline for an unanswered confirmation prompt (ms)
confirmation_timeout_ms = 30000
# Commands trusted for the whole session (no prompt, category unchanged)
trusted_commands = []
# Commands treated as SAFE
allowed_commands = []
# Commands blocked outright (cannot be trusted away)
blocked_commands = []
# Regex patterns auto-approved for the session
auto_approve_patterns = []
# Regex patterns blocked outright
always_block_patterns = []

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "warn"
# Output format: "pretty", "json", "compact"
format = "pretty"

[logging.file]
# Enable file logging to the squall log directory
enabled = false
"#
    }
}

/// Configuration-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed operator pattern
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Zero or nonsensical timeout
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(String),
}
