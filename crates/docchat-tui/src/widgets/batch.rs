//! Pending upload batch strip

use crate::theme::Theme;
use crate::widgets::spinner::spinner_frame;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use std::time::Duration;

/// Outcome message shown after a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripStatus<'a> {
    Success(&'a str),
    Failure(&'a str),
}

/// One line of chips for the files waiting to be uploaded.
///
/// Chips are numbered from 1, matching `/remove <n>`.
pub struct BatchStrip<'a> {
    files: &'a [String],
    theme: &'a Theme,
    uploading: Option<Duration>,
    status: Option<StripStatus<'a>>,
}

impl<'a> BatchStrip<'a> {
    pub fn new(files: &'a [String], theme: &'a Theme) -> Self {
        Self {
            files,
            theme,
            uploading: None,
            status: None,
        }
    }

    /// Show the in-flight indicator, animated by `elapsed`
    pub fn uploading(mut self, elapsed: Option<Duration>) -> Self {
        self.uploading = elapsed;
        self
    }

    pub fn status(mut self, status: Option<StripStatus<'a>>) -> Self {
        self.status = status;
        self
    }

    fn spans(&self) -> Vec<Span<'a>> {
        let mut spans = Vec::new();

        if self.files.is_empty() && self.uploading.is_none() {
            spans.push(Span::styled(
                "No files selected (/add <paths>)",
                self.theme.dim_style(),
            ));
        }
        for (i, name) in self.files.iter().enumerate() {
            spans.push(Span::styled(
                format!("[{}] {}", i + 1, name),
                self.theme.chip_style(),
            ));
            spans.push(Span::raw(" "));
        }

        if let Some(elapsed) = self.uploading {
            spans.push(Span::styled(
                format!(" {} Uploading...", spinner_frame(elapsed)),
                self.theme.accent_style(),
            ));
        }

        match self.status {
            Some(StripStatus::Success(message)) => {
                spans.push(Span::styled(format!(" ✓ {}", message), self.theme.success_style()))
            }
            Some(StripStatus::Failure(message)) => {
                spans.push(Span::styled(format!(" ✗ {}", message), self.theme.error_style()))
            }
            None => {}
        }

        spans
    }
}

impl Widget for BatchStrip<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        Paragraph::new(Line::from(self.spans()))
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }
}
