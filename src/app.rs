use crate::api::ApiClient;
use crate::config::Config;
use crate::state::{ChatSession, Role, Transcript};
use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DOCUMENT_NAME: &str = "Notes.pdf";
const STREAMING_MARKER: &str = "▍";
const WELCOME_LINES: [&str; 3] = [
    "Start Chatting with Your Study Assistant",
    "",
    "Ask questions about your uploaded study material, request explanations, or test your knowledge.",
];

/// Turn lifecycle events sent from the chat worker to the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    TurnComplete { cancelled: bool },
    Error(String),
}

struct TurnRequest {
    question: String,
    cancel: CancellationToken,
}

/// Front-end side of the background chat task.
///
/// Transcript snapshots arrive on a `watch` channel; turn completion and
/// errors arrive as [`UiUpdate`]s. Dropping the worker cancels the turn in
/// flight so its response body is released.
pub struct ChatWorker {
    request_tx: mpsc::UnboundedSender<TurnRequest>,
    update_rx: mpsc::UnboundedReceiver<UiUpdate>,
    transcript_rx: watch::Receiver<Transcript>,
    active_turn: Option<CancellationToken>,
}

impl ChatWorker {
    pub fn spawn(config: &Config) -> Result<Self> {
        let client = ApiClient::new(config)?;
        Ok(Self::spawn_with_session(ChatSession::new(
            client,
            config.trailing_line_policy,
        )))
    }

    pub fn spawn_with_session(mut session: ChatSession) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<TurnRequest>();
        let (update_tx, update_rx) = mpsc::unbounded_channel::<UiUpdate>();
        let transcript_rx = session.subscribe();

        task::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let update = match session.ask(&request.question, &request.cancel).await {
                    Ok(outcome) => UiUpdate::TurnComplete {
                        cancelled: outcome.is_cancelled(),
                    },
                    Err(error) => UiUpdate::Error(format!("{error:#}")),
                };
                if update_tx.send(update).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx,
            update_rx,
            transcript_rx,
            active_turn: None,
        }
    }

    /// Queue a question. Returns false once the worker has stopped.
    pub fn submit(&mut self, question: String) -> bool {
        let cancel = CancellationToken::new();
        let sent = self
            .request_tx
            .send(TurnRequest {
                question,
                cancel: cancel.clone(),
            })
            .is_ok();
        if sent {
            self.active_turn = Some(cancel);
        }
        sent
    }

    pub fn cancel_turn(&mut self) {
        if let Some(cancel) = self.active_turn.take() {
            cancel.cancel();
        }
    }

    pub fn try_next_update(&mut self) -> Option<UiUpdate> {
        let update = self.update_rx.try_recv().ok();
        if update.is_some() {
            self.active_turn = None;
        }
        update
    }

    pub async fn next_update(&mut self) -> Option<UiUpdate> {
        let update = self.update_rx.recv().await;
        self.active_turn = None;
        update
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript_rx.borrow().clone()
    }
}

impl Drop for ChatWorker {
    fn drop(&mut self) {
        self.cancel_turn();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAction {
    LineUp,
    LineDown,
    PageUp(usize),
    PageDown(usize),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    CancelTurn,
    Quit,
}

/// View state of the chat screen, independent of the terminal.
pub struct ChatMode {
    document_name: String,
    turn_in_progress: bool,
    cancel_pending: bool,
    last_error: Option<String>,
    /// Rows scrolled back from the bottom; 0 follows new output.
    scroll_back: usize,
}

impl ChatMode {
    pub fn new(document_name: Option<String>) -> Self {
        Self {
            document_name: document_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string()),
            turn_in_progress: false,
            cancel_pending: false,
            last_error: None,
            scroll_back: 0,
        }
    }

    pub fn header_line(&self) -> String {
        format!(
            "Padhai Whallah Chat · {} · {}",
            self.document_name,
            self.status_label()
        )
    }

    pub fn status_label(&self) -> String {
        if self.cancel_pending {
            "cancelling".to_string()
        } else if self.turn_in_progress {
            "Thinking...".to_string()
        } else if let Some(error) = &self.last_error {
            format!("error: {error}")
        } else {
            "ready".to_string()
        }
    }

    pub fn is_turn_in_progress(&self) -> bool {
        self.turn_in_progress
    }

    /// Accept a submission unless it is blank or a turn is still running.
    pub fn on_submit(&mut self, input: &str) -> Option<String> {
        let question = input.trim();
        if question.is_empty() || self.turn_in_progress {
            return None;
        }

        self.turn_in_progress = true;
        self.last_error = None;
        self.scroll_back = 0;
        Some(question.to_string())
    }

    pub fn on_update(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::TurnComplete { .. } => {}
            UiUpdate::Error(message) => self.last_error = Some(message),
        }
        self.turn_in_progress = false;
        self.cancel_pending = false;
    }

    pub fn on_interrupt(&mut self) -> InterruptAction {
        if self.turn_in_progress && !self.cancel_pending {
            self.cancel_pending = true;
            InterruptAction::CancelTurn
        } else {
            InterruptAction::Quit
        }
    }

    pub fn scroll(&mut self, action: ScrollAction) {
        self.scroll_back = match action {
            ScrollAction::LineUp => self.scroll_back.saturating_add(1),
            ScrollAction::LineDown => self.scroll_back.saturating_sub(1),
            ScrollAction::PageUp(rows) => self.scroll_back.saturating_add(rows),
            ScrollAction::PageDown(rows) => self.scroll_back.saturating_sub(rows),
            ScrollAction::End => 0,
        };
    }

    /// Top row to render so the view follows the bottom unless the user
    /// scrolled back.
    pub fn scroll_top(&mut self, total_rows: usize, viewport_rows: usize) -> usize {
        let max_top = total_rows.saturating_sub(viewport_rows);
        self.scroll_back = self.scroll_back.min(max_top);
        max_top - self.scroll_back
    }

    pub fn history_lines(&self, transcript: &Transcript) -> Vec<String> {
        if transcript.is_empty() {
            return WELCOME_LINES.iter().map(|line| line.to_string()).collect();
        }

        let last_index = transcript.len() - 1;
        let mut lines = Vec::new();
        for (index, message) in transcript.iter().enumerate() {
            if index > 0 {
                lines.push(String::new());
            }
            lines.push(format!("{}:", message.role.label()));

            let mut body = message.content.clone();
            if self.turn_in_progress && index == last_index && message.role == Role::Assistant {
                body.push_str(STREAMING_MARKER);
            }
            lines.extend(body.split('\n').map(|line| format!("  {line}")));
        }
        lines
    }
}
