//! Configuration loading
//!
//! The scheduler policies come from an optional TOML file, then individual
//! command-line flags override single fields.
//!
//! ```toml
//! level-capacity = 8
//! self-send = "forbid"
//! reply-policy = "any-process"
//! check-invariants = true
//! ```

use std::path::{Path, PathBuf};

use pqsim_core::{ReplyPolicy, SchedulerConfig, SelfSendPolicy};
use thiserror::Error;
use tracing::debug;

/// Errors reading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Parse a config from TOML text; missing keys keep their defaults
pub fn parse(text: &str) -> Result<SchedulerConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Load a config file, or the defaults when no path is given
pub fn load(path: Option<&Path>) -> Result<SchedulerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(SchedulerConfig::default());
    };

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), ?config, "loaded config");
    Ok(config)
}

/// Command-line overrides for individual config fields
#[derive(clap::Args, Clone, Debug, Default)]
pub struct Overrides {
    /// Maximum processes per priority level (default: unbounded)
    #[arg(long, value_name = "N")]
    pub level_capacity: Option<usize>,

    /// Reject sends whose target is the sender itself
    #[arg(long)]
    pub forbid_self_send: bool,

    /// Allow replies to processes that are not awaiting one
    #[arg(long)]
    pub reply_any: bool,

    /// Skip the invariant checks after each command
    #[arg(long)]
    pub no_invariant_checks: bool,
}

impl Overrides {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, mut config: SchedulerConfig) -> SchedulerConfig {
        if let Some(cap) = self.level_capacity {
            config.level_capacity = Some(cap);
        }
        if self.forbid_self_send {
            config.self_send = SelfSendPolicy::Forbid;
        }
        if self.reply_any {
            config.reply_policy = ReplyPolicy::AnyProcess;
        }
        if self.no_invariant_checks {
            config.check_invariants = false;
        }
        config
    }
}
