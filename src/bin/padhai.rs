use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use padhai::api::ApiClient;
use padhai::app::{ChatMode, ChatWorker, InterruptAction, ScrollAction, UiUpdate};
use padhai::config::{Config, TrailingLinePolicy};
use padhai::state::{Role, Transcript};
use padhai::terminal::TerminalGuard;
use padhai::ui::layout::split_chat_layout;
use padhai::ui::render::{
    history_row_count, input_visual_rows, render_header, render_input, render_transcript,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const MAX_INPUT_ROWS: usize = 6;
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(16);
const PAGE_ROWS: usize = 10;

/// Padhai Whallah: upload study notes and chat about them.
#[derive(Parser)]
#[command(name = "padhai", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PDF to the document-ingestion service
    Upload {
        /// Path to the .pdf file
        path: PathBuf,
    },
    /// Chat with the study assistant
    Chat {
        /// Document name shown in the header
        #[arg(long)]
        document: Option<String>,

        /// Treat text after the last newline as a final line when the stream ends
        #[arg(long)]
        flush_trailing_line: bool,
    },
}

enum FrontendEvent {
    Submit(String),
    Interrupt,
    Scroll(ScrollAction),
}

struct TuiFrontend {
    guard: TerminalGuard,
    quit: bool,
    input_buffer: String,
    cursor: usize,
}

impl TuiFrontend {
    fn new() -> Result<Self> {
        Ok(Self {
            guard: TerminalGuard::enter()?,
            quit: false,
            input_buffer: String::new(),
            cursor: 0,
        })
    }

    fn clamp_cursor_to_boundary_left(&self, mut idx: usize) -> usize {
        idx = idx.min(self.input_buffer.len());
        while idx > 0 && !self.input_buffer.is_char_boundary(idx) {
            idx -= 1;
        }
        idx
    }

    fn prev_char_boundary(&self, idx: usize) -> usize {
        let i = self.clamp_cursor_to_boundary_left(idx);
        self.input_buffer[..i]
            .char_indices()
            .next_back()
            .map(|(pos, _)| pos)
            .unwrap_or(0)
    }

    fn next_char_boundary(&self, idx: usize) -> usize {
        let i = self.clamp_cursor_to_boundary_left(idx);
        match self.input_buffer[i..].chars().next() {
            Some(ch) => i + ch.len_utf8(),
            None => self.input_buffer.len(),
        }
    }

    fn insert_str(&mut self, value: &str) {
        let cursor = self.clamp_cursor_to_boundary_left(self.cursor);
        self.input_buffer.insert_str(cursor, value);
        self.cursor = cursor + value.len();
    }

    fn backspace(&mut self) {
        let end = self.clamp_cursor_to_boundary_left(self.cursor);
        if end == 0 {
            return;
        }
        let start = self.prev_char_boundary(end);
        self.input_buffer.replace_range(start..end, "");
        self.cursor = start;
    }

    fn delete(&mut self) {
        let start = self.clamp_cursor_to_boundary_left(self.cursor);
        if start >= self.input_buffer.len() {
            return;
        }
        let end = self.next_char_boundary(start);
        self.input_buffer.replace_range(start..end, "");
        self.cursor = start;
    }

    fn clear_input(&mut self) {
        self.input_buffer.clear();
        self.cursor = 0;
    }

    fn map_key(&mut self, key: KeyEvent) -> Option<FrontendEvent> {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if control => Some(FrontendEvent::Interrupt),
            KeyCode::Char('d') if control => {
                if self.input_buffer.is_empty() {
                    self.quit = true;
                }
                None
            }
            KeyCode::Char('j') if control => {
                self.insert_str("\n");
                None
            }
            KeyCode::PageUp => Some(FrontendEvent::Scroll(ScrollAction::PageUp(PAGE_ROWS))),
            KeyCode::PageDown => Some(FrontendEvent::Scroll(ScrollAction::PageDown(PAGE_ROWS))),
            KeyCode::Up => Some(FrontendEvent::Scroll(ScrollAction::LineUp)),
            KeyCode::Down => Some(FrontendEvent::Scroll(ScrollAction::LineDown)),
            KeyCode::End if control => Some(FrontendEvent::Scroll(ScrollAction::End)),
            KeyCode::Home => {
                self.cursor = 0;
                None
            }
            KeyCode::End => {
                self.cursor = self.input_buffer.len();
                None
            }
            KeyCode::Left => {
                self.cursor = self.prev_char_boundary(self.cursor);
                None
            }
            KeyCode::Right => {
                self.cursor = self.next_char_boundary(self.cursor);
                None
            }
            KeyCode::Backspace => {
                self.backspace();
                None
            }
            KeyCode::Delete => {
                self.delete();
                None
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.insert_str("\n");
                None
            }
            KeyCode::Enter => Some(FrontendEvent::Submit(self.input_buffer.clone())),
            KeyCode::Char(ch) if !control && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.insert_str(&ch.to_string());
                None
            }
            _ => None,
        }
    }

    fn poll_event(&mut self) -> Option<FrontendEvent> {
        let Ok(has_event) = event::poll(INPUT_POLL_INTERVAL) else {
            self.quit = true;
            return None;
        };
        if !has_event {
            return None;
        }

        match event::read() {
            Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => self.map_key(key),
            Ok(Event::Paste(text)) => {
                self.insert_str(&text);
                None
            }
            Ok(_) => None,
            Err(_) => {
                self.quit = true;
                None
            }
        }
    }

    fn render(&mut self, mode: &mut ChatMode, transcript: &Transcript) {
        let header = mode.header_line();
        let lines = mode.history_lines(transcript);
        let locked = mode.is_turn_in_progress();
        let input = self.input_buffer.as_str();
        let cursor = self.cursor;

        let _ = self.guard.terminal_mut().draw(|frame| {
            let area = frame.area();
            let input_width = area.width.saturating_sub(2).max(1) as usize;
            let input_rows = input_visual_rows(input, input_width).min(MAX_INPUT_ROWS) as u16;
            let panes = split_chat_layout(area, input_rows);

            let total_rows = history_row_count(&lines, panes.transcript.width as usize);
            let top = mode.scroll_top(total_rows, panes.transcript.height as usize);

            render_header(frame, panes.header, &header);
            render_transcript(frame, panes.transcript, &lines, top);
            render_input(frame, panes.input, input, cursor, locked);
        });
    }
}

async fn run_tui(mut worker: ChatWorker, mut mode: ChatMode) -> Result<()> {
    let mut frontend = TuiFrontend::new()?;

    while !frontend.quit {
        while let Some(update) = worker.try_next_update() {
            mode.on_update(update);
        }
        frontend.render(&mut mode, &worker.transcript());

        match frontend.poll_event() {
            Some(FrontendEvent::Submit(text)) => {
                if let Some(question) = mode.on_submit(&text) {
                    frontend.clear_input();
                    if !worker.submit(question) {
                        mode.on_update(UiUpdate::Error("chat worker stopped".to_string()));
                    }
                }
            }
            Some(FrontendEvent::Interrupt) => match mode.on_interrupt() {
                InterruptAction::CancelTurn => worker.cancel_turn(),
                InterruptAction::Quit => frontend.quit = true,
            },
            Some(FrontendEvent::Scroll(action)) => mode.scroll(action),
            None => tokio::task::yield_now().await,
        }
    }

    Ok(())
}

/// Line-oriented mode for pipes: one question per stdin line, each answer
/// printed once its stream closes.
async fn run_plain(mut worker: ChatWorker, mut mode: ChatMode) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let Some(question) = mode.on_submit(&line) else {
            continue;
        };
        if !worker.submit(question) {
            anyhow::bail!("chat worker stopped");
        }

        let Some(update) = worker.next_update().await else {
            anyhow::bail!("chat worker stopped");
        };
        if let UiUpdate::Error(message) = &update {
            eprintln!("[error] {message}");
        }
        mode.on_update(update);

        if let Some(answer) = worker
            .transcript()
            .last()
            .filter(|message| message.role == Role::Assistant)
        {
            println!("{}: {}", Role::Assistant.label(), answer.content);
        }
    }

    Ok(())
}

async fn upload(config: &Config, path: &Path) -> Result<()> {
    let client = ApiClient::new(config)?;
    println!("Uploading {}...", path.display());

    let receipt = client.upload_document(path).await?;
    println!("uploaded {} (HTTP {})", receipt.file_name, receipt.status);
    println!("next: padhai chat --document \"{}\"", receipt.file_name);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;
    config.validate()?;

    match cli.command {
        Command::Upload { path } => upload(&config, &path).await,
        Command::Chat {
            document,
            flush_trailing_line,
        } => {
            if flush_trailing_line {
                config.trailing_line_policy = TrailingLinePolicy::Flush;
            }
            let worker = ChatWorker::spawn(&config)?;
            let mode = ChatMode::new(document);

            if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
                run_tui(worker, mode).await
            } else {
                run_plain(worker, mode).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_chat_flags() {
        let cli = Cli::try_parse_from([
            "padhai",
            "chat",
            "--document",
            "Organic Chemistry.pdf",
            "--flush-trailing-line",
        ])
        .expect("chat args should parse");

        match cli.command {
            Command::Chat {
                document,
                flush_trailing_line,
            } => {
                assert_eq!(document.as_deref(), Some("Organic Chemistry.pdf"));
                assert!(flush_trailing_line);
            }
            Command::Upload { .. } => panic!("expected chat"),
        }
    }

    #[test]
    fn cli_requires_upload_path() {
        assert!(Cli::try_parse_from(["padhai", "upload"]).is_err());
        let cli = Cli::try_parse_from(["padhai", "upload", "notes.pdf"]).expect("upload args");
        assert!(matches!(cli.command, Command::Upload { path } if path == Path::new("notes.pdf")));
    }
}
