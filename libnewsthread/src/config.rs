//! Configuration management for Newsthread
//!
//! The configuration is read once at process entry, secrets from the
//! environment are folded in by [`Config::apply_env_overrides`], and the
//! resulting value is handed to every component constructor. Nothing below
//! this module reads the environment.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::signer::SigningCredentials;

/// Service identifier used for quota accounting of publish calls
pub const X_SERVICE: &str = "x";
/// Default monthly ceiling for publish calls, kept under the platform cap of 500
pub const DEFAULT_X_CEILING: u32 = 450;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub composer: ComposerConfig,
    pub x: XConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Service identifier for quota accounting
    #[serde(default = "default_search_service")]
    pub service: String,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_items_per_query")]
    pub items_per_query: usize,
    #[serde(default = "default_queries")]
    pub queries: Vec<SearchQuery>,
}

/// One content query, e.g. international or national news
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Category tag attached to every item the query returns
    pub category: String,
    /// What to search for
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    #[serde(default = "default_composer_service")]
    pub service: String,
    #[serde(default = "default_composer_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_composer_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_segment_count")]
    pub segment_count: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    #[serde(default = "default_x_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Monthly request ceilings per service identifier
    #[serde(default = "default_ceilings")]
    pub ceilings: HashMap<String, u32>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            ceilings: default_ceilings(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Pause between consecutive posts, e.g. "2s"; "0s" disables pacing
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay: String,
    /// Thread topic label; `{date}` is replaced with the run date
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            pacing_delay: default_pacing_delay(),
            topic: default_topic(),
        }
    }
}

impl PublishingConfig {
    /// Parsed pacing delay
    pub fn pacing_delay(&self) -> Result<Duration> {
        humantime::parse_duration(&self.pacing_delay).map_err(|e| {
            ConfigError::InvalidValue {
                field: "publishing.pacing_delay".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Topic label for a thread published on `date`
    pub fn topic_for(&self, date: chrono::NaiveDate) -> String {
        self.topic.replace("{date}", &date.format("%Y-%m-%d").to_string())
    }
}

fn default_search_service() -> String {
    "search".to_string()
}

fn default_search_endpoint() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_search_model() -> String {
    "sonar".to_string()
}

fn default_items_per_query() -> usize {
    5
}

fn default_queries() -> Vec<SearchQuery> {
    vec![
        SearchQuery {
            category: "international".to_string(),
            topic: "the most important international news of the last 24 hours".to_string(),
        },
        SearchQuery {
            category: "national".to_string(),
            topic: "the most important national news of the last 24 hours".to_string(),
        },
    ]
}

fn default_composer_service() -> String {
    "composer".to_string()
}

fn default_composer_endpoint() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_composer_model() -> String {
    "sonar".to_string()
}

fn default_segment_count() -> usize {
    10
}

fn default_max_chars() -> usize {
    280
}

fn default_x_endpoint() -> String {
    "https://api.twitter.com/2/tweets".to_string()
}

fn default_ceilings() -> HashMap<String, u32> {
    let mut ceilings = HashMap::new();
    ceilings.insert(X_SERVICE.to_string(), DEFAULT_X_CEILING);
    ceilings
}

fn default_pacing_delay() -> String {
    "2s".to_string()
}

fn default_topic() -> String {
    "News digest {date}".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Fill secrets from `NEWSTHREAD_*` environment variables
    ///
    /// A set variable overrides the value from the file. Call once at
    /// process entry, before handing the configuration to components.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut Option<String>); 6] = [
            ("NEWSTHREAD_X_CONSUMER_KEY", &mut self.x.consumer_key),
            ("NEWSTHREAD_X_CONSUMER_SECRET", &mut self.x.consumer_secret),
            ("NEWSTHREAD_X_ACCESS_TOKEN", &mut self.x.access_token),
            ("NEWSTHREAD_X_ACCESS_TOKEN_SECRET", &mut self.x.access_token_secret),
            ("NEWSTHREAD_SEARCH_API_KEY", &mut self.search.api_key),
            ("NEWSTHREAD_COMPOSER_API_KEY", &mut self.composer.api_key),
        ];

        for (name, slot) in fields {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *slot = Some(value);
            }
        }
    }

    /// Check that every secret and setting the job needs is present
    pub fn validate(&self) -> Result<()> {
        let secrets = [
            ("x.consumer_key", &self.x.consumer_key),
            ("x.consumer_secret", &self.x.consumer_secret),
            ("x.access_token", &self.x.access_token),
            ("x.access_token_secret", &self.x.access_token_secret),
            ("search.api_key", &self.search.api_key),
            ("composer.api_key", &self.composer.api_key),
        ];

        for (field, value) in secrets {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(ConfigError::MissingField(field.to_string()).into());
            }
        }

        if self.search.queries.is_empty() {
            return Err(ConfigError::MissingField("search.queries".to_string()).into());
        }

        if self.composer.segment_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "composer.segment_count".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        self.publishing.pacing_delay()?;
        Ok(())
    }

    /// Signing credentials for the publishing platform
    pub fn signing_credentials(&self) -> Result<SigningCredentials> {
        Ok(SigningCredentials {
            consumer_key: required(&self.x.consumer_key, "x.consumer_key")?,
            consumer_secret: SecretString::from(required(&self.x.consumer_secret, "x.consumer_secret")?),
            access_token: required(&self.x.access_token, "x.access_token")?,
            token_secret: SecretString::from(required(&self.x.access_token_secret, "x.access_token_secret")?),
        })
    }

    /// API key for the search service
    pub fn search_api_key(&self) -> Result<SecretString> {
        required(&self.search.api_key, "search.api_key").map(SecretString::from)
    }

    /// API key for the composer service
    pub fn composer_api_key(&self) -> Result<SecretString> {
        required(&self.composer.api_key, "composer.api_key").map(SecretString::from)
    }

    /// Create a default configuration (secrets unset)
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/newsthread/newsthread.db".to_string(),
            },
            search: SearchConfig {
                service: default_search_service(),
                endpoint: default_search_endpoint(),
                model: default_search_model(),
                api_key: None,
                items_per_query: default_items_per_query(),
                queries: default_queries(),
            },
            composer: ComposerConfig {
                service: default_composer_service(),
                endpoint: default_composer_endpoint(),
                model: default_composer_model(),
                api_key: None,
                segment_count: default_segment_count(),
                max_chars: default_max_chars(),
            },
            x: XConfig {
                endpoint: default_x_endpoint(),
                consumer_key: None,
                consumer_secret: None,
                access_token: None,
                access_token_secret: None,
            },
            quota: QuotaConfig::default(),
            publishing: PublishingConfig::default(),
        }
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingField(field.to_string()).into()),
    }
}

/// Resolve the configuration file path (`$NEWSTHREAD_CONFIG` or the XDG config dir)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("NEWSTHREAD_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("newsthread").join("config.toml"))
}
