//! Message list widget for displaying the conversation

use crate::theme::Theme;
use crate::widgets::markdown::{render_markdown, sanitize, wrap_line};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

const THINKING_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    /// Local notices (help text, upload results, failures)
    System,
}

/// A single message in the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Whether this is an error notice
    pub is_error: bool,
    /// Whether this answer is still streaming
    pub is_streaming: bool,
}

impl ChatMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create the live, still-growing assistant message
    pub fn assistant_streaming(content: impl Into<String>) -> Self {
        Self {
            is_streaming: true,
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(MessageRole::System, content)
        }
    }
}

/// Widget for displaying a list of chat messages
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
    frame: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
            frame: 0,
        }
    }

    /// Set scroll offset in lines
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Animation frame for the thinking indicator
    pub fn frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    fn render_message(&self, msg: &ChatMessage, width: usize) -> Vec<Line<'static>> {
        render_message_lines(msg, self.theme, width, self.frame)
    }
}

fn render_message_lines(
    msg: &ChatMessage,
    theme: &Theme,
    width: usize,
    frame: usize,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (role_text, role_style, prefix) = match msg.role {
        MessageRole::User => ("You", theme.accent_bold(), "▶ "),
        MessageRole::Assistant => (
            "Assistant",
            theme.success_style().add_modifier(Modifier::BOLD),
            "◀ ",
        ),
        MessageRole::System if msg.is_error => ("Error", theme.error_style(), "● "),
        MessageRole::System => ("System", theme.dim_style(), "● "),
    };

    let header = if msg.is_streaming {
        format!("{}{} ▌", prefix, role_text)
    } else {
        format!("{}{}", prefix, role_text)
    };
    lines.push(Line::from(Span::styled(header, role_style)));

    let content_width = width.saturating_sub(2);

    if msg.role == MessageRole::Assistant {
        if msg.content.trim().is_empty() && msg.is_streaming {
            let spinner = THINKING_FRAMES[frame % THINKING_FRAMES.len()];
            lines.push(Line::from(Span::styled(
                format!("  {} thinking...", spinner),
                theme.warning_style(),
            )));
        } else {
            for line in render_markdown(&msg.content, theme, content_width)
                .into_iter()
                .flat_map(|line| wrap_line(line, content_width))
            {
                let mut indented_spans = vec![Span::raw("  ")];
                indented_spans.extend(line.spans);
                lines.push(Line::from(indented_spans));
            }
        }
    } else {
        let content_style = if msg.is_error {
            theme.error_style()
        } else if msg.role == MessageRole::System {
            theme.dim_style()
        } else {
            theme.base_style()
        };

        let clean = sanitize(&msg.content);
        for line in textwrap::wrap(&clean, content_width.max(1)) {
            lines.push(Line::from(Span::styled(
                format!("  {}", line),
                content_style,
            )));
        }
    }

    // Empty line between messages
    lines.push(Line::from(""));

    lines
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let width = area.width as usize;
        let visible_lines: Vec<Line> = self
            .messages
            .iter()
            .flat_map(|msg| self.render_message(msg, width))
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();

        Paragraph::new(visible_lines).render(area, buf);
    }
}

/// Calculate total height of messages in lines
pub fn calculate_message_height(messages: &[ChatMessage], theme: &Theme, width: usize) -> usize {
    messages
        .iter()
        .map(|msg| render_message_lines(msg, theme, width, 0).len())
        .sum()
}
