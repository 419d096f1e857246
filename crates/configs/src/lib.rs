use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Where the entries document lives and how to reach the contents API.
///
/// The three credentials/location fields are optional here on purpose: the
/// server starts without them and every request checks them through
/// [`StoreConfig::resolve`].
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_commit_origin")]
    pub commit_origin: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            token: None,
            repo: None,
            file_path: None,
            branch: None,
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            commit_origin: default_commit_origin(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// token 不能出现在日志里
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("repo", &self.repo)
            .field("file_path", &self.file_path)
            .field("branch", &self.branch)
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .field("commit_origin", &self.commit_origin)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Opt-in retry of the whole read-modify-write cycle on version conflicts.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_api_base() -> String { "https://api.github.com".into() }
fn default_user_agent() -> String { "entry-store".into() }
fn default_commit_origin() -> String { "Grand Board".into() }
fn default_connect_timeout() -> u64 { 5 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_base() -> u64 { 100 }
fn default_backoff_max() -> u64 { 2000 }

/// Repository + path (and optional branch) of the entries document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    pub repo: String,
    pub path: String,
    pub branch: Option<String>,
}

/// Everything needed to talk to the store for one request.
#[derive(Clone)]
pub struct StoreAccess {
    pub token: String,
    pub location: StoreLocation,
}

impl fmt::Debug for StoreAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreAccess")
            .field("token", &"<redacted>")
            .field("location", &self.location)
            .finish()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing store settings: {}", .0.join(", "))]
    MissingStoreSettings(Vec<&'static str>),
}

/// Load `CONFIG_PATH` (default `config.toml`); a missing file yields the defaults.
pub fn load_default_if_present() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !std::path::Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Config file if present (defaults otherwise), then environment
    /// overrides, then validation.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default_if_present()?;
        cfg.apply_env_with(|key| std::env::var(key).ok());
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Apply overrides from a key lookup; blank values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERVER_HOST") { self.server.host = v; }
        if let Some(p) = get("SERVER_PORT").and_then(|v| v.parse::<u16>().ok()) { self.server.port = p; }
        if let Some(w) = get("TOKIO_WORKER_THREADS").and_then(|v| v.parse::<usize>().ok()) {
            self.server.worker_threads = Some(w);
        }

        if let Some(v) = get("GITHUB_TOKEN") { self.store.token = Some(v); }
        if let Some(v) = get("GITHUB_REPO") { self.store.repo = Some(v); }
        if let Some(v) = get("GITHUB_FILE_PATH") { self.store.file_path = Some(v); }
        if let Some(v) = get("GITHUB_BRANCH") { self.store.branch = Some(v); }
        if let Some(v) = get("GITHUB_API_BASE") { self.store.api_base = v; }
        if let Some(v) = get("GITHUB_USER_AGENT") { self.store.user_agent = v; }
        if let Some(v) = get("COMMIT_ORIGIN") { self.store.commit_origin = v; }

        if let Some(v) = get("ENTRY_STORE_RETRY_ENABLED") {
            self.retry.enabled = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(n) = get("ENTRY_STORE_RETRY_MAX_ATTEMPTS").and_then(|v| v.parse::<u32>().ok()) {
            self.retry.max_attempts = n;
        }
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 归一化 server
        self.server.normalize()?;
        self.store.normalize()?;
        self.retry.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl StoreConfig {
    fn normalize(&mut self) -> Result<()> {
        let base = self.api_base.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(anyhow!("store.api_base must start with http(s)"));
        }
        self.api_base = base.to_string();
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(anyhow!("store timeouts must be positive seconds"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the three required settings and build the per-request access.
    /// Blank values count as missing.
    pub fn resolve(&self) -> Result<StoreAccess, ConfigError> {
        fn present(v: &Option<String>) -> Option<String> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
        }

        let token = present(&self.token);
        let repo = present(&self.repo);
        let path = present(&self.file_path)
            .map(|p| p.trim_start_matches('/').to_string())
            .filter(|p| !p.is_empty());

        match (token, repo, path) {
            (Some(token), Some(repo), Some(path)) => Ok(StoreAccess {
                token,
                location: StoreLocation { repo, path, branch: present(&self.branch) },
            }),
            (token, repo, path) => {
                let mut missing = Vec::new();
                if token.is_none() { missing.push("token"); }
                if repo.is_none() { missing.push("repo"); }
                if path.is_none() { missing.push("file_path"); }
                Err(ConfigError::MissingStoreSettings(missing))
            }
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        if self.enabled && self.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be >= 1 when retry is enabled"));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(anyhow!("retry.backoff_max_ms must be >= backoff_base_ms"));
        }
        Ok(())
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}
