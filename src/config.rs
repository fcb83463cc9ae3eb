use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::util::{is_local_endpoint_url, parse_bool_flag};

const DEFAULT_API_URL: &str = "http://localhost:8001";
const DEFAULT_QUESTION_PATH: &str = "/ask-question/stream";
const DEFAULT_INGEST_PATH: &str = "/process-pdf";

/// What to do with text left in the line buffer when the stream ends
/// without a final newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingLinePolicy {
    /// Drop the unterminated residual.
    #[default]
    Discard,
    /// Parse a non-blank residual as one last line.
    Flush,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub question_path: String,
    pub ingest_path: String,
    pub trailing_line_policy: TrailingLinePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            question_path: DEFAULT_QUESTION_PATH.to_string(),
            ingest_path: DEFAULT_INGEST_PATH.to_string(),
            trailing_line_policy: TrailingLinePolicy::Discard,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = non_empty_env("PADHAI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let question_path = non_empty_env("PADHAI_QUESTION_PATH")
            .unwrap_or_else(|| DEFAULT_QUESTION_PATH.to_string());
        let ingest_path =
            non_empty_env("PADHAI_INGEST_PATH").unwrap_or_else(|| DEFAULT_INGEST_PATH.to_string());
        let trailing_line_policy = match std::env::var("PADHAI_FLUSH_TRAILING_LINE")
            .ok()
            .and_then(parse_bool_flag)
        {
            Some(true) => TrailingLinePolicy::Flush,
            _ => TrailingLinePolicy::Discard,
        };

        Ok(Self {
            api_url,
            question_path,
            ingest_path,
            trailing_line_policy,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid PADHAI_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        for (name, path) in [
            ("PADHAI_QUESTION_PATH", &self.question_path),
            ("PADHAI_INGEST_PATH", &self.ingest_path),
        ] {
            if !path.starts_with('/') {
                bail!("Invalid {name} '{path}': expected a path starting with '/'");
            }
        }

        Ok(())
    }

    pub fn question_url(&self) -> String {
        join_url(&self.api_url, &self.question_path)
    }

    pub fn ingest_url(&self) -> String {
        join_url(&self.api_url, &self.ingest_path)
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls_point_at_local_service() {
        let config = Config::default();
        assert_eq!(
            config.question_url(),
            "http://localhost:8001/ask-question/stream"
        );
        assert_eq!(config.ingest_url(), "http://localhost:8001/process-pdf");
        assert!(config.is_local_endpoint());
    }

    #[test]
    fn test_join_url_strips_trailing_slash() {
        assert_eq!(
            join_url("https://study.example.com/", "/process-pdf"),
            "https://study.example.com/process-pdf"
        );
    }

    #[test]
    fn test_load_reads_flush_flag() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("PADHAI_FLUSH_TRAILING_LINE", "yes");
        let config = Config::load().expect("config should load");
        assert_eq!(config.trailing_line_policy, TrailingLinePolicy::Flush);

        std::env::set_var("PADHAI_FLUSH_TRAILING_LINE", "maybe");
        let config = Config::load().expect("config should load");
        assert_eq!(config.trailing_line_policy, TrailingLinePolicy::Discard);
        std::env::remove_var("PADHAI_FLUSH_TRAILING_LINE");
    }

    #[test]
    fn test_load_ignores_blank_api_url() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("PADHAI_API_URL", "   ");
        let config = Config::load().expect("config should load");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        std::env::remove_var("PADHAI_API_URL");
    }

    #[test]
    fn test_validate_rejects_relative_paths() {
        let config = Config {
            ingest_path: "process-pdf".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
