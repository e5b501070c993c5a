use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 Chrome/47.0.2526.106 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub concurrency: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub user_agent: String,
    /// Salt for the owner-id anonymizer.
    pub anon_salt: String,
    /// Pages per rayon batch / DB transaction when processing.
    pub chunk_size: usize,
}

impl Settings {
    /// Defaults, then `workout_etl.toml` if present, then `WORKOUT_*` env vars.
    pub fn load() -> Result<Self> {
        Self::builder()?
            .add_source(File::with_name("workout_etl").required(false))
            .add_source(Environment::with_prefix("WORKOUT"))
            .build()
            .and_then(Config::try_deserialize)
            .context("Failed to load settings")
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("db_path", "data/workouts.sqlite")?
            .set_default("concurrency", 10)?
            .set_default("max_retries", 3)?
            .set_default("base_backoff_ms", 2000)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("anon_salt", "")?
            .set_default("chunk_size", 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize() {
        let settings: Settings = Settings::builder()
            .unwrap()
            .build()
            .and_then(Config::try_deserialize)
            .unwrap();
        assert_eq!(settings.db_path, "data/workouts.sqlite");
        assert_eq!(settings.concurrency, 10);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.chunk_size, 500);
        assert!(settings.anon_salt.is_empty());
        assert!(settings.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn overrides_win() {
        let settings: Settings = Settings::builder()
            .unwrap()
            .set_override("concurrency", 2)
            .unwrap()
            .set_override("db_path", ":memory:")
            .unwrap()
            .build()
            .and_then(Config::try_deserialize)
            .unwrap();
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.db_path, ":memory:");
    }
}
