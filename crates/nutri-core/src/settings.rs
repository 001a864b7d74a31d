//! Application settings and the process environment snapshot.
//!
//! | Setting | Default | Env override |
//! |---------|---------|--------------|
//! | app_name | NutriAI | NUTRI_APP_NAME |
//! | host | 127.0.0.1 | NUTRI_HOST |
//! | port | 8010 | NUTRI_PORT |
//! | storage_path | ./data/nutri_store | NUTRI_STORAGE_PATH |
//! | gemini_api_base | https://generativelanguage.googleapis.com | NUTRI_GEMINI_API_BASE |
//! | gemini_model | gemini-pro | NUTRI_GEMINI_MODEL |
//! | ai_timeout_secs | 60 | NUTRI_AI_TIMEOUT_SECS |
//! | database_probe_delay_ms | 1000 | NUTRI_DATABASE_PROBE_DELAY_MS |
//! | persist_generated_secret | true | NUTRI_PERSIST_GENERATED_SECRET |
//!
//! Credentials are not settings: they go through [`Environment`] and the resolver.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutriConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub storage_path: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub ai_timeout_secs: u64,
    pub database_probe_delay_ms: u64,
    pub persist_generated_secret: bool,
}

impl NutriConfig {
    /// Load settings. Precedence: env `NUTRI_*` > file at `NUTRI_CONFIG` (default `config/nutri.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("NUTRI_CONFIG").unwrap_or_else(|_| "config/nutri.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("app_name", "NutriAI")?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8010_i64)?
            .set_default("storage_path", "./data/nutri_store")?
            .set_default("gemini_api_base", DEFAULT_GEMINI_API_BASE)?
            .set_default("gemini_model", DEFAULT_GEMINI_MODEL)?
            .set_default("ai_timeout_secs", 60_i64)?
            .set_default("database_probe_delay_ms", 1000_i64)?
            .set_default("persist_generated_secret", true)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        builder
            .add_source(
                config::Environment::with_prefix("NUTRI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            gemini_api_base: self.gemini_api_base.trim_end_matches('/').to_string(),
            ai_timeout: Duration::from_secs(self.ai_timeout_secs),
            database_probe_delay: Duration::from_millis(self.database_probe_delay_ms),
            persist_generated_secret: self.persist_generated_secret,
        }
    }
}

/// Knobs the resolver needs beyond its sources.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub gemini_api_base: String,
    pub ai_timeout: Duration,
    pub database_probe_delay: Duration,
    pub persist_generated_secret: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            ai_timeout: Duration::from_secs(60),
            database_probe_delay: Duration::from_millis(1000),
            persist_generated_secret: true,
        }
    }
}

/// Immutable snapshot of environment variables taken at construction.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Trimmed, non-empty value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// First non-empty value among `names`.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|n| self.get(n))
    }
}
