mod target;

pub use target::{DriverSelection, PostgresConfig, SqliteConfig, TargetConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{RatchetError, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "ratchet.toml";

/// Root configuration for a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Time budget for each target unit, covering all of its attempts.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Attempts per target before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Load `*.fixture.sql` companions with their migrations. They are
    /// reported by `validate` and `status` but never applied.
    #[serde(default)]
    pub fixtures: bool,

    /// Targets to migrate.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl RunConfig {
    /// Load, substitute, parse and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RatchetError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::parse_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without validating it.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| RatchetError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Fill in default target names and check every rule, reporting all faults at once.
    pub fn validate(&mut self) -> Result<()> {
        for (i, target) in self.targets.iter_mut().enumerate() {
            if target.name.trim().is_empty() {
                target.name = format!("target-{}", i);
            }
        }

        let mut faults = Vec::new();

        if self.timeout_secs == 0 {
            faults.push("timeout must be greater than 0".to_string());
        }

        if self.targets.is_empty() {
            faults.push("no targets specified".to_string());
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name.as_str()) {
                faults.push(format!("[{}] target name is used more than once", target.name));
            }
            faults.extend(target.validate());
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(RatchetError::Config(format!(
                "config is invalid:\n{}",
                faults.join("\n")
            )))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Attempts per unit. A zero setting still runs once.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
