//! Configuration loader and validator for the Navidrome→Mastodon bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Overrides `source.password` when set.
pub const ENV_SOURCE_PASSWORD: &str = "STARBOT_SOURCE_PASSWORD";
/// Overrides `mastodon.access_token` when set.
pub const ENV_MASTODON_TOKEN: &str = "STARBOT_MASTODON_TOKEN";

const VISIBILITIES: [&str; 4] = ["public", "unlisted", "private", "direct"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub source: Source,
    pub mastodon: Mastodon,
    #[serde(default)]
    pub post: Post,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    pub poll_interval_seconds: u64,
}

/// Subsonic-compatible media server (Navidrome) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// Mastodon account settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mastodon {
    pub base_url: String,
    pub access_token: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    /// Profile metadata field that shows the latest played track. Off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_field: Option<String>,
}

/// Post composition settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_media_settle_seconds")]
    pub media_settle_seconds: u64,
}

impl Default for Post {
    fn default() -> Self {
        Self {
            header: default_header(),
            media_settle_seconds: default_media_settle_seconds(),
        }
    }
}

fn default_state_file() -> String {
    "posted.json".into()
}

fn default_client_name() -> String {
    "starbot".into()
}

fn default_api_version() -> String {
    "1.16.1".into()
}

fn default_visibility() -> String {
    "public".into()
}

fn default_header() -> String {
    "🎵 New favorite".into()
}

fn default_media_settle_seconds() -> u64 {
    5
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// Location of the published-ids file. A relative `state_file` lives under `data_dir`.
    pub fn state_path(&self) -> PathBuf {
        let file = Path::new(&self.app.state_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(&self.app.data_dir).join(file)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.app.poll_interval_seconds)
    }

    pub fn media_settle(&self) -> Duration {
        Duration::from_secs(self.post.media_settle_seconds)
    }

    /// Replace secrets with values from the environment, if present.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(ENV_SOURCE_PASSWORD).filter(|v| !v.is_empty()) {
            self.source.password = password;
        }
        if let Some(token) = lookup(ENV_MASTODON_TOKEN).filter(|v| !v.is_empty()) {
            self.mastodon.access_token = token;
        }
    }
}

/// Load configuration from a YAML file, apply env overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.state_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.state_file must be non-empty"));
    }
    if cfg.app.poll_interval_seconds == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_seconds must be > 0"));
    }

    if !is_http_url(&cfg.source.base_url) {
        return Err(ConfigError::Invalid("source.base_url must be an http(s) URL"));
    }
    if cfg.source.username.trim().is_empty() {
        return Err(ConfigError::Invalid("source.username must be non-empty"));
    }
    if cfg.source.password.is_empty() {
        return Err(ConfigError::Invalid("source.password must be non-empty"));
    }
    if cfg.source.client_name.trim().is_empty() {
        return Err(ConfigError::Invalid("source.client_name must be non-empty"));
    }
    if cfg.source.api_version.trim().is_empty() {
        return Err(ConfigError::Invalid("source.api_version must be non-empty"));
    }

    if !is_http_url(&cfg.mastodon.base_url) {
        return Err(ConfigError::Invalid("mastodon.base_url must be an http(s) URL"));
    }
    if cfg.mastodon.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid("mastodon.access_token must be non-empty"));
    }
    if !VISIBILITIES.contains(&cfg.mastodon.visibility.as_str()) {
        return Err(ConfigError::Invalid(
            "mastodon.visibility must be one of public, unlisted, private, direct",
        ));
    }

    if matches!(&cfg.mastodon.profile_field, Some(name) if name.trim().is_empty()) {
        return Err(ConfigError::Invalid(
            "mastodon.profile_field must be non-empty when set",
        ));
    }

    if cfg.post.header.trim().is_empty() {
        return Err(ConfigError::Invalid("post.header must be non-empty"));
    }

    Ok(())
}

fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Returns the example YAML content shipped with the bot.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  state_file: "posted.json"
  poll_interval_seconds: 30

source:
  base_url: "http://localhost:4533"
  username: "YOUR_NAVIDROME_USERNAME"
  password: "YOUR_NAVIDROME_PASSWORD"
  client_name: "starbot"
  api_version: "1.16.1"

mastodon:
  base_url: "https://mastodon.social"
  access_token: "YOUR_MASTODON_ACCESS_TOKEN"
  visibility: "public"
  # Uncomment to show the latest played track in this profile field.
  # profile_field: "Now playing"

post:
  header: "🎵 New favorite"
  media_settle_seconds: 5
"#
}
