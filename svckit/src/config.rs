use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::errors::ThinkerError;
use crate::types::TableTarget;

/// Prefix of the environment variables that can set any flag, e.g. `THINKER_HOST`.
pub const ENV_PREFIX: &str = "THINKER";
/// Names the config file when `--config` is not given
pub const CONFIG_FILE_ENV: &str = "THINKER_CONFIG";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 28015;

/// Settings for one invocation, merged from defaults, an optional config file,
/// `THINKER_*` environment variables and CLI flags (in increasing precedence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkerConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "key", default)]
    pub auth_key: Option<String>,
    pub verbose: bool,
    pub follow: bool,
    pub silent: bool,
    pub times: u32,
    pub delay: u64,
    pub discover: bool,
    /// Database and table named on the command line; never read from a file.
    #[serde(skip)]
    pub target: Option<TableTarget>,
}

impl Default for ThinkerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            auth_key: None,
            verbose: false,
            follow: false,
            silent: false,
            times: 1,
            delay: 0,
            discover: true,
            target: None,
        }
    }
}

impl ThinkerConfig {
    /// Network address of the seed server: `host:port`, or `host` alone when
    /// the port is 0.
    pub fn address(&self) -> Result<String, ThinkerError> {
        let address = if self.port > 0 {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        };

        if address.is_empty() {
            return Err(ThinkerError::ConfigError("url is invalid".to_string()));
        }
        Ok(address)
    }

    pub fn with_target(mut self, target: Option<TableTarget>) -> Self {
        self.target = target;
        self
    }

    pub fn target(&self) -> Result<&TableTarget, ThinkerError> {
        self.target
            .as_ref()
            .ok_or_else(|| ThinkerError::ArgumentError("wrong number of params".to_string()))
    }

    /// Database the session should default to, if the command named one.
    pub fn database(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.db.as_str())
    }

    /// Auth key to send in the handshake; an empty key is the same as none.
    pub fn auth_key(&self) -> &str {
        self.auth_key.as_deref().unwrap_or_default()
    }
}

/// Values given explicitly on the command line. `None` means "not given",
/// so lower-precedence sources still apply.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub key: Option<String>,
    pub verbose: Option<bool>,
    pub follow: Option<bool>,
    pub silent: Option<bool>,
    pub times: Option<u32>,
    pub delay: Option<u64>,
    pub discover: Option<bool>,
}

pub fn load_config(overrides: &ConfigOverrides) -> Result<ThinkerConfig, ThinkerError> {
    let mut builder = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("verbose", false)?
        .set_default("follow", false)?
        .set_default("silent", false)?
        .set_default("times", 1_i64)?
        .set_default("delay", 0_i64)?
        .set_default("discover", true)?;

    let config_file = overrides
        .config_file
        .clone()
        .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));

    if let Some(path) = &config_file {
        debug!(config_file = %path.display(), "Adding configuration file source");
        builder = builder.add_source(File::from(path.as_path()).required(false));
    }

    let config = builder
        // Values stay strings here; typed fields are converted on deserialize
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .set_override_option("host", overrides.host.clone())?
        .set_override_option("port", overrides.port.map(i64::from))?
        .set_override_option("key", overrides.key.clone())?
        .set_override_option("verbose", overrides.verbose)?
        .set_override_option("follow", overrides.follow)?
        .set_override_option("silent", overrides.silent)?
        .set_override_option("times", overrides.times.map(i64::from))?
        .set_override_option("delay", overrides.delay.and_then(|d| i64::try_from(d).ok()))?
        .set_override_option("discover", overrides.discover)?
        .build()?;

    let resolved: ThinkerConfig = config.try_deserialize()?;
    resolved.address()?;

    Ok(resolved)
}
