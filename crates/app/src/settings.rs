//! Handles settings for the application. Configuration is written in
//! `settings.toml` and can be overridden with `REMIT_`-prefixed environment
//! variables, e.g. `REMIT_CACHE__EXPENSES_TTL_SECS=60`.
//!
//! See `settings.toml` for the configuration.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub expenses_ttl_secs: i64,
    pub transactions_ttl_secs: i64,
}

/// Distance-matrix service. Without it trips must carry their own distance.
#[derive(Debug, Deserialize)]
pub struct Distance {
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub cache: Cache,
    pub distance: Option<Distance>,
}

impl Settings {
    /// Load `path` (extension optional, file optional) and the environment.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .set_default("cache.expenses_ttl_secs", 300)?
            .set_default("cache.transactions_ttl_secs", 300)?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("REMIT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let settings = Settings::new("does-not-exist").unwrap();
        assert_eq!(settings.cache.expenses_ttl_secs, 300);
        assert_eq!(settings.cache.transactions_ttl_secs, 300);
        assert!(settings.distance.is_none());
    }
}
