use crate::error::{DecodeError, FragmentParseError, TransportError};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_API_LOG_PATH: &str = "/tmp/padhai-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "PADHAI_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "PADHAI_API_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message = format!(
        "PADHAI_API DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n"
    );
    emit_log_message(&message);
}

pub fn emit_fragment_parse_error(error: &FragmentParseError) {
    let message = format_fragment_parse_error(error);
    emit_log_message(&message);
}

pub fn emit_decode_error(error: &DecodeError) {
    emit_log_message(&format!("PADHAI_API WARN decode_failed error={error}\n"));
}

pub fn emit_transport_error(request_url: &str, error: &TransportError) {
    emit_log_message(&format!(
        "PADHAI_API ERROR stream_transport_failed url={request_url} error={}\n",
        error.message()
    ));
}

fn format_fragment_parse_error(error: &FragmentParseError) -> String {
    let cause = std::error::Error::source(error)
        .map(ToString::to_string)
        .unwrap_or_else(|| "<unknown>".to_string());
    format!(
        "PADHAI_API ERROR fragment_parse_failed error={cause}\nline:\n{}\n",
        error.line()
    )
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(API_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            // A raw-mode terminal UI owns stderr; keep log lines off the screen.
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_API_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
        assert!(!debug_payload_enabled());
    }

    #[test]
    fn test_resolve_log_path_uses_api_log_path() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(API_LOG_PATH_ENV, "/tmp/test-padhai-api.log");
        assert_eq!(
            resolve_log_path().as_deref(),
            Some("/tmp/test-padhai-api.log")
        );
        std::env::remove_var(API_LOG_PATH_ENV);
    }

    #[test]
    fn test_fragment_parse_error_is_written_to_log_file() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        let dir = tempfile::TempDir::new().expect("temp dir");
        let log_path = dir.path().join("api.log");
        std::env::set_var(API_LOG_PATH_ENV, &log_path);

        let source = serde_json::from_str::<Value>("{bad json").unwrap_err();
        emit_fragment_parse_error(&FragmentParseError::new("{bad json", source));
        std::env::remove_var(API_LOG_PATH_ENV);

        let logged = std::fs::read_to_string(&log_path).expect("log file should exist");
        assert!(logged.contains("fragment_parse_failed"));
        assert!(logged.contains("line:\n{bad json"));
    }
}
