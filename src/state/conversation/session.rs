use super::super::sink::TranscriptSink;
use super::super::transcript::Transcript;
use crate::api::ApiClient;
use crate::config::TrailingLinePolicy;
use std::sync::Arc;
use tokio::sync::watch;

/// One chat session: the transcript plus the client used to answer
/// questions. Questions are answered one at a time.
pub struct ChatSession {
    pub(super) client: Arc<ApiClient>,
    pub(super) sink: TranscriptSink,
    pub(super) trailing_line_policy: TrailingLinePolicy,
}

impl ChatSession {
    pub fn new(client: ApiClient, trailing_line_policy: TrailingLinePolicy) -> Self {
        Self {
            client: Arc::new(client),
            sink: TranscriptSink::new(),
            trailing_line_policy,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.sink.subscribe()
    }

    pub fn transcript(&self) -> Transcript {
        self.sink.snapshot()
    }

    pub fn client(&self) -> Arc<ApiClient> {
        Arc::clone(&self.client)
    }
}
