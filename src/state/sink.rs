use super::transcript::{Message, Transcript};
use crate::api::stream::Fragment;
use tokio::sync::watch;

/// Owns the authoritative transcript and publishes whole snapshots.
///
/// Observers hold `watch::Receiver`s and only ever see complete snapshots;
/// an append is visible after `send_replace` swaps the new value in.
pub struct TranscriptSink {
    transcript: Transcript,
    in_progress: Option<usize>,
    publisher: watch::Sender<Transcript>,
}

impl Default for TranscriptSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptSink {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(Transcript::new());
        Self {
            transcript: Transcript::new(),
            in_progress: None,
            publisher,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.publisher.subscribe()
    }

    pub fn snapshot(&self) -> Transcript {
        self.transcript.clone()
    }

    /// Record the user's question and open an empty assistant message to
    /// receive the answer. Seals any message still in progress.
    pub fn begin_turn(&mut self, question: impl Into<String>) {
        self.end_turn();
        self.transcript.push(Message::user(question));
        self.in_progress = Some(self.transcript.push(Message::assistant("")));
        self.publish();
    }

    /// Append to the in-progress assistant message. Returns whether a new
    /// snapshot was published.
    pub fn apply(&mut self, fragment: &Fragment) -> bool {
        if fragment.is_empty() {
            return false;
        }
        let Some(index) = self.in_progress else {
            return false;
        };
        let Some(current) = self.transcript.get(index) else {
            return false;
        };

        let mut updated = current.clone();
        updated.content.push_str(&fragment.text);
        self.transcript.replace(index, updated);
        self.publish();
        true
    }

    pub fn end_turn(&mut self) {
        self.in_progress = None;
    }

    pub fn has_turn_in_progress(&self) -> bool {
        self.in_progress.is_some()
    }

    pub fn in_progress_content(&self) -> Option<&str> {
        self.in_progress
            .and_then(|index| self.transcript.get(index))
            .map(|message| message.content.as_str())
    }

    fn publish(&self) {
        self.publisher.send_replace(self.transcript.clone());
    }
}
