pub mod consumer;
mod conversation;
pub mod sink;
pub mod transcript;

pub use consumer::{StreamConsumer, StreamOutcome, StreamPhase, StreamState, StreamStats};
pub use conversation::ChatSession;
pub use sink::TranscriptSink;
pub use transcript::{Message, Role, Transcript};
