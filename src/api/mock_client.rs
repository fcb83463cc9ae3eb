use crate::api::client::{ByteStream, MockStreamProducer};
use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};

/// One scripted answer for the mock question endpoint.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Body delivered as these chunks, verbatim.
    Chunks(Vec<String>),
    /// Body chunks followed by a read failure.
    FailAfter(Vec<String>, String),
    /// Request rejected before any body arrives.
    Refuse(String),
}

#[derive(Clone)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    questions: Arc<Mutex<Vec<String>>>,
}

impl MockApiClient {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            questions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(&self, question: &str) -> Result<ByteStream> {
        self.questions.lock().unwrap().push(question.to_string());

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!(
                "MockApiClient: No more responses configured"
            ));
        }

        let (chunks, failure) = match responses_guard.remove(0) {
            MockResponse::Chunks(chunks) => (chunks, None),
            MockResponse::FailAfter(chunks, message) => (chunks, Some(message)),
            MockResponse::Refuse(message) => return Err(anyhow::anyhow!(message)),
        };

        let mut items: Vec<Result<Bytes>> = chunks.into_iter().map(|s| Ok(Bytes::from(s))).collect();
        if let Some(message) = failure {
            items.push(Err(anyhow::anyhow!(message)));
        }

        Ok(Box::pin(stream::iter(items)))
    }
}
