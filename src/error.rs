/// Errors raised while consuming a streamed answer.
///
/// Only [`StreamError::Transport`] ends a stream. Decode and fragment errors
/// are contained by the layer that detects them and only surface here when a
/// caller wants to report them.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    FragmentParse(#[from] FragmentParseError),
}

/// Connection drop, non-2xx status, or a failed body read.
#[derive(thiserror::Error, Debug)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for TransportError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(format!("{error:#}"))
    }
}

/// Invalid or truncated UTF-8 in the response body.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid UTF-8 sequence of {len} byte(s) at stream offset {offset}")]
    InvalidSequence { offset: usize, len: usize },

    #[error("stream ended inside a {len}-byte partial UTF-8 sequence")]
    TruncatedSequence { len: usize },
}

/// A complete NDJSON line that is not valid JSON.
#[derive(thiserror::Error, Debug)]
#[error("malformed fragment: {source}")]
pub struct FragmentParseError {
    line: String,
    #[source]
    source: serde_json::Error,
}

impl FragmentParseError {
    pub fn new(line: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            line: line.into(),
            source,
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_keeps_anyhow_context_chain() {
        let error = anyhow::anyhow!("connection reset").context("reading body");
        let transport = TransportError::from(error);
        assert_eq!(transport.message(), "reading body: connection reset");
        assert_eq!(
            StreamError::from(transport).to_string(),
            "transport error: reading body: connection reset"
        );
    }

    #[test]
    fn test_fragment_parse_error_retains_line() {
        let source = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let error = FragmentParseError::new("{bad", source);
        assert_eq!(error.line(), "{bad");
        assert!(error.to_string().starts_with("malformed fragment:"));
    }
}
