//! The `config` module loads node settings.
//!
//! Sources, later ones winning:
//! - built-in defaults (`Settings::default()`)
//! - `config/default.toml` (optional)
//! - a `.env` file, if present, loaded into the process environment
//! - `SOSRELAY__<SECTION>__<KEY>` environment variables
//!
//! List values from the environment are comma separated.

mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    KeySettings, LoggingSettings, NodeSettings, PartialSettings, RelaySettings, Settings,
    StorageSettings,
};

const DEFAULT_CONFIG_FILE: &str = "config/default";
const ENV_PREFIX: &str = "SOSRELAY";

/// Load settings from `config/default.*` and the environment.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Like `load_config`, with an explicit config file base name.
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    // a missing .env is the normal case
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("node.peers")
                .with_list_parse_key("keys.trusted_keys"),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
