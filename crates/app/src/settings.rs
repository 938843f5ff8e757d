//! Handles settings for the application.
//!
//! Values come from `settings.toml` (optional) and are overridden by
//! environment variables prefixed with `TALLY__`, using `__` between nested
//! keys, e.g. `TALLY__STORE__PATH=/var/lib/tally.db`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Store {
    Memory,
    Sqlite { path: String },
}

impl Default for Store {
    fn default() -> Self {
        Self::Sqlite {
            path: "tally.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub list_limit: usize,
    pub default_page_size: usize,
    pub batch_max_retries: u32,
    pub batch_backoff_ms: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            list_limit: engine::DEFAULT_LIST_LIMIT,
            default_page_size: engine::DEFAULT_PAGE_SIZE,
            batch_max_retries: 3,
            batch_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub store: Store,
    pub engine: Engine,
}

impl Settings {
    /// Load `{file}.toml` if present, then apply the environment.
    pub fn new(file: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("TALLY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::new("does-not-exist/settings").unwrap();
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.engine.list_limit, 1000);
        assert_eq!(settings.engine.default_page_size, 50);
        assert!(matches!(settings.store, Store::Sqlite { ref path } if path == "tally.db"));
    }
}
