use super::super::consumer::{StreamConsumer, StreamOutcome, StreamStats};
use super::ChatSession;
use crate::api::logging::emit_transport_error;
use crate::api::reader::StreamReader;
use crate::error::StreamError;
use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

impl ChatSession {
    /// Ask one question and stream the answer into the transcript.
    ///
    /// The user message and an empty assistant message are published before
    /// the request goes out. On a transport error the partial answer stays
    /// in the transcript and the error is returned as a [`StreamError`].
    pub async fn ask(&mut self, question: &str, cancel: &CancellationToken) -> Result<StreamOutcome> {
        let question = question.trim();
        if question.is_empty() {
            bail!("question must not be empty");
        }

        self.sink.begin_turn(question);
        let client = self.client();

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.sink.end_turn();
                return Ok(StreamOutcome::Cancelled(StreamStats::default()));
            }
            body = client.ask_question_stream(question) => body,
        };

        let result = match body {
            Ok(body) => {
                let mut consumer = StreamConsumer::new(self.trailing_line_policy);
                consumer
                    .run(StreamReader::new(body), &mut self.sink, cancel)
                    .await
            }
            Err(error) => Err(error),
        };
        self.sink.end_turn();

        match result {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                emit_transport_error(client.question_url(), &error);
                Err(StreamError::from(error).into())
            }
        }
    }
}
