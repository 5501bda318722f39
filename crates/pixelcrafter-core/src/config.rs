//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";
/// Environment variable overriding the backend URL.
pub const BACKEND_URL_ENV: &str = "PIXELCRAFTER_BACKEND_URL";
/// Environment variable overriding where the session token is kept.
pub const TOKEN_FILE_ENV: &str = "PIXELCRAFTER_TOKEN_FILE";
/// Default timeout for a single HTTP request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL without the `/api` suffix.
    pub api_base_url: String,
    pub timeout: Duration,
    /// Token file; `None` uses the platform data directory.
    pub token_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            token_file: None,
        }
    }

    /// Defaults overridden by `PIXELCRAFTER_BACKEND_URL` and
    /// `PIXELCRAFTER_TOKEN_FILE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.api_base_url = url.trim().to_string();
        }
        if let Some(path) = lookup(TOKEN_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            config.token_file = Some(PathBuf::from(path));
        }
        config
    }

    pub fn with_backend(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.token_file.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ClientConfig::from_lookup(|key| match key {
            BACKEND_URL_ENV => Some("https://paint.example.com ".to_string()),
            TOKEN_FILE_ENV => Some("/tmp/pc-token".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://paint.example.com");
        assert_eq!(config.token_file, Some(PathBuf::from("/tmp/pc-token")));
    }

    #[test]
    fn test_blank_environment_ignored() {
        let config = ClientConfig::from_lookup(|_| Some(String::new()));
        assert_eq!(config, ClientConfig::default());
    }
}
