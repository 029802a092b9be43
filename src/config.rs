//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs where pull requests are fetched from,
//! how far pagination may go, and how long a stalled upstream is waited on.

use crate::fetcher::{FetchOptions, DEFAULT_MAX_PAGES, DEFAULT_PER_PAGE};
use serde::Deserialize;
use std::time::Duration as StdDuration;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Fallback GitHub token, used when a request carries no bearer credential.
    pub github_token: Option<String>,

    /// Base URL of the GitHub REST API. Override for GitHub Enterprise.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Number of pull requests requested per page (GitHub allows at most 100).
    #[serde(default = "default_per_page")]
    pub per_page: u8,

    /// Hard limit on the number of paginated requests to make to the GitHub API per query.
    #[serde(default = "default_max_pages")]
    pub max_github_api_pages: u32,

    /// Upper bound, in seconds, on a single GitHub API request.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

fn default_per_page() -> u8 {
    DEFAULT_PER_PAGE
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_port() -> u16 {
    3000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api_url: default_github_api_url(),
            per_page: default_per_page(),
            max_github_api_pages: default_max_pages(),
            request_timeout_seconds: default_request_timeout_seconds(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_seconds)
    }

    /// Pagination settings, with the page size clamped to what GitHub accepts.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            per_page: self.per_page.clamp(1, DEFAULT_PER_PAGE),
            max_pages: self.max_github_api_pages.max(1),
        }
    }

    /// The configured fallback token, ignoring blank values.
    pub fn fallback_token(&self) -> Option<&str> {
        self.github_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 6] = [
        "GITHUB_TOKEN",
        "GITHUB_API_URL",
        "PER_PAGE",
        "MAX_GITHUB_API_PAGES",
        "REQUEST_TIMEOUT_SECONDS",
        "PORT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "ghp_test");
        env::set_var("GITHUB_API_URL", "https://github.example.com/api/v3");
        env::set_var("PER_PAGE", "50");
        env::set_var("MAX_GITHUB_API_PAGES", "5");
        env::set_var("REQUEST_TIMEOUT_SECONDS", "10");
        env::set_var("PORT", "8080");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.github_token.as_deref(), Some("ghp_test"));
        assert_eq!(config.github_api_url, "https://github.example.com/api/v3");
        assert_eq!(config.per_page, 50);
        assert_eq!(config.max_github_api_pages, 5);
        assert_eq!(config.request_timeout(), StdDuration::from_secs(10));
        assert_eq!(config.port, 8080);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.github_token, None);
        assert_eq!(config.github_api_url, DEFAULT_GITHUB_API_URL);
        assert_eq!(config.fetch_options(), FetchOptions::default());
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.port, 3000);
    }

    #[test]
    #[serial]
    fn test_config_invalid_value() {
        clear_env();
        env::set_var("MAX_GITHUB_API_PAGES", "lots");

        let result = AppConfig::from_env();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    fn test_fetch_options_clamped() {
        let config = AppConfig {
            per_page: 250,
            max_github_api_pages: 0,
            ..AppConfig::default()
        };

        let options = config.fetch_options();
        assert_eq!(options.per_page, 100);
        assert_eq!(options.max_pages, 1);
    }

    #[test]
    fn test_fallback_token_ignores_blank() {
        let config = AppConfig {
            github_token: Some("  ".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.fallback_token(), None);
    }
}
