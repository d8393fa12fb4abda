use ::config::{Config, Environment, File};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use super::settings::BotConfig;

pub const ENV_PREFIX: &str = "VAULT_BOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Loads defaults, then the optional file at `path`, then `VAULT_BOT__*`
/// environment overrides (after reading `.env`).
pub fn load_config(path: impl AsRef<Path>) -> Result<BotConfig, ConfigError> {
    let path = path.as_ref();
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", env_file.display());
    }

    let settings = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: BotConfig = settings.try_deserialize()?;
    config.validate().map_err(ConfigError::Invalid)?;

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}
