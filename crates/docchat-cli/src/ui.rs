//! TUI implementation for docchat

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream, MouseEventKind};
use docchat_client::{BackendClient, TerminateReason};
use docchat_core::{
    FileRegistryView, SelectionReport, SessionEvent, SessionHandle, StreamSessionController,
    SubmitOutcome, UploadBatchManager,
};
use docchat_tui::{
    Theme,
    input::{Action, event_to_action},
    widgets::{
        BatchStrip, ChatMessage, FileListPopup, FileListState, FileRow, InputBox, MessageList,
        Spinner, StripStatus, message_list::calculate_message_height,
    },
};
use futures::StreamExt;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::{Command, help_message, parse_command};
use crate::utils::{describe_error, describe_exclusions, read_candidates, truncate_chars};

const PLACEHOLDER: &str = "Ask a question...";

/// Results of work spawned off the UI task
#[derive(Debug)]
pub enum UiMessage {
    /// `/add` finished reading and selecting files
    FilesSelected {
        report: SelectionReport,
        unreadable: Vec<String>,
    },
    UploadFinished(docchat_core::Result<SubmitOutcome>),
    /// The document list was fetched for the popup
    FilesLoaded(Result<usize, String>),
    DeleteFinished {
        name: String,
        result: docchat_core::Result<()>,
    },
}

/// What the loop should do after a key press
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Ask(String),
    Quit,
}

/// TUI application state
pub struct TuiState {
    messages: Vec<ChatMessage>,
    input: InputBox,
    scroll: usize,
    status: String,
    theme: Theme,
    base_url: String,
    ui_tx: mpsc::Sender<UiMessage>,
    uploads: UploadBatchManager,
    registry: Arc<FileRegistryView>,
    files_popup: FileListState,
    streaming: bool,
    /// Spinner start time for animation
    spinner_start: Instant,
    frame: usize,
}

impl TuiState {
    pub fn new(
        theme: Theme,
        base_url: String,
        uploads: UploadBatchManager,
        registry: Arc<FileRegistryView>,
        ui_tx: mpsc::Sender<UiMessage>,
    ) -> Self {
        let mut input = InputBox::new().with_placeholder(PLACEHOLDER);
        input.set_focused(true);

        Self {
            messages: vec![],
            input,
            scroll: 0,
            status: "Ready".to_string(),
            theme,
            base_url,
            ui_tx,
            uploads,
            registry,
            files_popup: FileListState::default(),
            streaming: false,
            spinner_start: Instant::now(),
            frame: 0,
        }
    }

    fn scroll_to_bottom(&mut self) {
        // Resolved against the content height during render
        self.scroll = usize::MAX;
    }

    pub fn show_system_message(&mut self, content: &str) {
        self.messages.push(ChatMessage::system(content));
        self.scroll_to_bottom();
    }

    pub fn show_error(&mut self, content: &str) {
        self.messages.push(ChatMessage::error(content));
        self.scroll_to_bottom();
    }

    fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
        self.input.set_disabled(streaming);
    }

    /// A session started: show the question and an empty live answer
    fn on_session_started(&mut self, handle: &SessionHandle) {
        tracing::debug!("Streaming session {}", handle.id);
        self.set_streaming(true);
        self.spinner_start = Instant::now();
        self.status = "Streaming answer...".to_string();
        self.messages.push(ChatMessage::user(&handle.query));
        self.messages.push(ChatMessage::assistant_streaming(""));
        self.scroll_to_bottom();
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Partial { text, .. } => {
                if let Some(last) = self.messages.last_mut().filter(|m| m.is_streaming) {
                    last.content = text;
                }
                self.scroll_to_bottom();
            }
            SessionEvent::Finished { entry, reason, .. } => {
                match self.messages.last_mut().filter(|m| m.is_streaming) {
                    Some(last) => {
                        last.content = entry.content().to_string();
                        last.is_streaming = false;
                    }
                    None => self.messages.push(ChatMessage::assistant(entry.content())),
                }
                self.status = match reason {
                    TerminateReason::Completed => "Ready".to_string(),
                    TerminateReason::Failed(e) => {
                        format!("Stream ended early: {}", truncate_chars(&e, 60))
                    }
                };
                self.set_streaming(false);
                self.input.clear();
                self.scroll_to_bottom();
            }
        }
    }

    fn handle_ui_message(&mut self, msg: UiMessage) {
        match msg {
            UiMessage::FilesSelected { report, unreadable } => {
                for problem in unreadable {
                    self.show_error(&format!("Cannot read {}", problem));
                }
                if report.ignored {
                    self.show_system_message("Upload in progress; selection ignored");
                    return;
                }
                let excluded = describe_exclusions(&report);
                if !excluded.is_empty() {
                    self.show_system_message(&format!("Skipped: {}", excluded.join(", ")));
                }
                if report.replaced_batch() {
                    self.status = format!("Selected {} file(s)", report.accepted);
                } else {
                    self.show_system_message("No .txt or .md files selected");
                }
            }
            UiMessage::UploadFinished(result) => match result {
                Ok(SubmitOutcome::Uploaded { files, .. }) => {
                    tracing::debug!("Uploaded {} file(s)", files);
                }
                Ok(SubmitOutcome::Empty) => {
                    self.show_system_message("No files selected (/add <paths>)");
                }
                Err(e) if e.is_busy() => self.status = e.to_string(),
                Err(e) => self.show_error(&format!("Upload failed: {}", describe_error(&e))),
            },
            UiMessage::FilesLoaded(result) => match result {
                Ok(count) => {
                    self.files_popup.clamp(count);
                }
                Err(e) => self.show_error(&format!("Could not load documents: {}", e)),
            },
            UiMessage::DeleteFinished { name, result } => match result {
                Ok(()) => {
                    self.files_popup.clamp(self.registry.files().len());
                    self.status = format!("Deleted {}", name);
                }
                Err(e) if e.is_busy() => self.status = e.to_string(),
                Err(e) => {
                    self.show_error(&format!("Could not delete {}: {}", name, describe_error(&e)))
                }
            },
        }
    }

    fn open_files(&mut self) {
        self.files_popup.show();
        let registry = self.registry.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = registry
                .show()
                .await
                .map(|files| files.len())
                .map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::FilesLoaded(result)).await;
        });
    }

    fn close_files(&mut self) {
        self.files_popup.hide();
        self.registry.hide();
    }

    fn delete_selected(&mut self) {
        let files = self.registry.files();
        let Some(file) = files.get(self.files_popup.selected).cloned() else {
            return;
        };
        if let Some(pending) = self.registry.pending_delete() {
            self.status = format!("Already deleting {}", pending);
            return;
        }

        let registry = self.registry.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = registry.delete_one(&file.id).await;
            let _ = tx
                .send(UiMessage::DeleteFinished {
                    name: file.filename,
                    result,
                })
                .await;
        });
    }

    fn start_upload(&mut self) {
        if self.uploads.is_submitting() {
            self.status = "Upload already in progress".to_string();
            return;
        }
        if self.uploads.pending_len() == 0 {
            self.show_system_message("No files selected (/add <paths>)");
            return;
        }

        self.spinner_start = Instant::now();
        let uploads = self.uploads.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = uploads.submit().await;
            let _ = tx.send(UiMessage::UploadFinished(result)).await;
        });
    }

    fn add_files(&mut self, paths: Vec<std::path::PathBuf>) {
        let uploads = self.uploads.clone();
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let (candidates, unreadable) = read_candidates(&paths).await;
            let report = uploads.select(candidates);
            let _ = tx
                .send(UiMessage::FilesSelected { report, unreadable })
                .await;
        });
    }

    fn run_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Add(paths) => self.add_files(paths),
            Command::Remove(index) => match self.uploads.remove(index) {
                Some(file) => self.status = format!("Removed {}", file.name()),
                None => self.show_system_message(&format!("No file #{} in the batch", index + 1)),
            },
            Command::Clear => {
                self.uploads.clear();
                self.status = "Batch cleared".to_string();
            }
            Command::Upload => self.start_upload(),
            Command::Files => self.open_files(),
            Command::Help => self.show_system_message(&help_message()),
            Command::Quit => return Flow::Quit,
            Command::Usage(usage) => self.show_system_message(&format!("Usage: {}", usage)),
            Command::Unknown(cmd) => self.show_system_message(&format!(
                "Unknown command: /{}\nType /help for available commands.",
                cmd
            )),
        }
        Flow::Continue
    }

    /// Handle keyboard action
    fn handle_action(&mut self, action: Action, width: u16) -> Flow {
        if self.files_popup.visible {
            let count = self.registry.files().len();
            match action {
                Action::Up => self.files_popup.up(count),
                Action::Down => self.files_popup.down(count),
                Action::Delete | Action::Char('d') => self.delete_selected(),
                Action::Escape | Action::Files => self.close_files(),
                Action::Interrupt | Action::Quit => return Flow::Quit,
                // Ignore other actions while the popup is open
                _ => {}
            }
            return Flow::Continue;
        }

        match action {
            Action::Submit => {
                if self.streaming {
                    return Flow::Continue;
                }
                let content = self.input.content().to_string();
                if let Some(command) = parse_command(&content) {
                    self.input.clear();
                    return self.run_command(command);
                }
                if content.trim().is_empty() {
                    return Flow::Continue;
                }
                // The question stays in the input until its answer finishes
                Flow::Ask(content)
            }
            Action::Quit | Action::Interrupt | Action::Escape => Flow::Quit,
            Action::Files => {
                self.open_files();
                Flow::Continue
            }
            Action::Upload => {
                self.start_upload();
                Flow::Continue
            }
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                Flow::Continue
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                Flow::Continue
            }
            _ => {
                self.input.handle_action(&action, width);
                Flow::Continue
            }
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // Layout: messages (flex), batch strip (1), status bar (1), input (3)
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(size);

        self.render_messages(frame, chunks[0]);
        self.render_batch(frame, chunks[1]);
        self.render_status(frame, chunks[2]);
        self.input.render(chunks[3], frame.buffer_mut(), &self.theme);

        if self.files_popup.visible {
            self.render_files(frame, size);
        }
    }

    fn render_files(&self, frame: &mut Frame, area: Rect) {
        let files = self.registry.files();
        let pending = self.registry.pending_delete();
        let rows: Vec<FileRow> = files
            .iter()
            .map(|f| FileRow {
                name: &f.filename,
                id: &f.id,
            })
            .collect();

        FileListPopup::new(rows, &self.theme)
            .with_selected(self.files_popup.selected)
            .with_pending_delete(pending.as_deref())
            .render_centered(area, frame.buffer_mut());
    }

    fn render_batch(&self, frame: &mut Frame, area: Rect) {
        let names: Vec<String> = self
            .uploads
            .pending()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        let status = self.uploads.status();
        let strip_status = status.as_ref().map(|s| {
            if s.is_success() {
                StripStatus::Success(s.message())
            } else {
                StripStatus::Failure(s.message())
            }
        });
        let uploading = self
            .uploads
            .is_submitting()
            .then(|| self.spinner_start.elapsed());

        let strip = BatchStrip::new(&names, &self.theme)
            .uploading(uploading)
            .status(strip_status);
        frame.render_widget(strip, area);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(" docchat │ {} ", self.base_url);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(title);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 || self.messages.is_empty() {
            frame.render_widget(self.welcome(), inner);
            return;
        }

        let content_height =
            calculate_message_height(&self.messages, &self.theme, inner.width as usize);

        if self.scroll == usize::MAX {
            self.scroll = content_height.saturating_sub(inner.height as usize);
        } else {
            self.scroll = self
                .scroll
                .min(content_height.saturating_sub(inner.height as usize));
        }

        let message_list = MessageList::new(&self.messages, &self.theme)
            .scroll(self.scroll)
            .frame(self.frame);
        frame.render_widget(message_list, inner);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn welcome(&self) -> Paragraph<'static> {
        let key = |k: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(format!("    {:<10}", k), self.theme.accent_style()),
                Span::styled(what, self.theme.base_style()),
            ])
        };

        Paragraph::new(vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    "  docchat",
                    self.theme.base_style().add_modifier(Modifier::BOLD),
                ),
                Span::styled(" - ask questions about your documents", self.theme.dim_style()),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!("  Backend: {}", self.base_url),
                self.theme.dim_style(),
            )),
            Line::from(""),
            Line::from(Span::styled("  Keybindings", self.theme.warning_style())),
            Line::from(""),
            key("Enter", "Ask the question"),
            key("Ctrl+U", "Upload selected files"),
            key("Ctrl+F", "Show stored documents"),
            key("PgUp/Dn", "Scroll history"),
            key("Ctrl+C", "Quit"),
            Line::from(""),
            Line::from(Span::styled(
                "  Select files with /add <paths>, then upload with Ctrl+U. /help lists commands.",
                Style::default().fg(self.theme.dim),
            )),
        ])
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if self.streaming {
            let spinner =
                Spinner::new(&self.status, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let left_content = self.status.as_str();
        let right_content = "Ctrl+F: files │ Ctrl+U: upload │ Ctrl+C: quit";

        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(left_content, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, self.theme.dim_style()),
            ])
        } else {
            Line::from(Span::styled(left_content, self.theme.dim_style()))
        };

        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Run the TUI application
pub async fn run_tui(client: Arc<BackendClient>, theme: Theme) -> anyhow::Result<()> {
    use crossterm::{
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    };
    use ratatui::{Terminal, backend::CrosstermBackend};
    use std::io;

    let mut controller = StreamSessionController::new(client.clone());
    let uploads = UploadBatchManager::new(client.clone());
    let registry = Arc::new(FileRegistryView::new(
        client.clone(),
        uploads.refresh_token().clone(),
    ));

    // Refetch the document list after every successful upload
    let cancel = CancellationToken::new();
    let follower = registry.clone().follow(cancel.clone());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (ui_tx, mut ui_rx) = mpsc::channel::<UiMessage>(32);
    let mut state = TuiState::new(
        theme,
        client.base_url().to_string(),
        uploads,
        registry,
        ui_tx,
    );

    let mut event_stream = EventStream::new();

    // Tick interval for animations and status expiry
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    let result = loop {
        terminal.draw(|frame| state.render(frame))?;
        let area_width = terminal.size()?.width;

        tokio::select! {
            // Chunks of the live answer, strictly in arrival order
            event = controller.next_event(), if controller.is_streaming() => {
                if let Some(event) = event {
                    state.handle_session_event(event);
                }
            }

            event = event_stream.next() => {
                let action = match event {
                    Some(Ok(Event::Mouse(mouse))) => {
                        match mouse.kind {
                            MouseEventKind::ScrollUp => {
                                state.scroll = state.scroll.saturating_sub(3);
                            }
                            MouseEventKind::ScrollDown => {
                                state.scroll = state.scroll.saturating_add(3);
                            }
                            _ => {}
                        }
                        continue;
                    }
                    Some(Ok(event)) => match event_to_action(event) {
                        Some(action) => action,
                        None => continue,
                    },
                    Some(Err(e)) => break Err(anyhow::anyhow!("Event error: {}", e)),
                    None => break Ok(()),
                };

                match state.handle_action(action, area_width) {
                    Flow::Continue => {}
                    Flow::Quit => break Ok(()),
                    Flow::Ask(query) => {
                        if let Some(handle) = controller.begin(&query).await {
                            state.on_session_started(&handle);
                        } else if let Some(active) = controller.active_query() {
                            state.status =
                                format!("Still answering: {}", truncate_chars(active, 40));
                        }
                    }
                }
            }

            msg = ui_rx.recv() => {
                if let Some(msg) = msg {
                    state.handle_ui_message(msg);
                }
            }

            _ = tick_interval.tick() => {
                state.frame = state.frame.wrapping_add(1);
            }
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    cancel.cancel();
    if let Err(e) = follower.await {
        tracing::warn!("Registry follower ended abnormally: {}", e);
    }

    result
}
