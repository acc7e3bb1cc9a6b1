//! Popup listing the documents stored on the backend

use crate::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, HighlightSpacing, List, ListItem, ListState, StatefulWidget, Widget,
    },
};
use unicode_width::UnicodeWidthStr;

/// Maximum width for the popup
const MAX_POPUP_WIDTH: u16 = 80;
/// Maximum height for the popup, borders included
const MAX_POPUP_HEIGHT: u16 = 20;

const PENDING_MARKER: &str = " (deleting...)";

/// A row of the document list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRow<'a> {
    pub name: &'a str,
    pub id: &'a str,
}

/// Popup showing the remote documents
pub struct FileListPopup<'a> {
    rows: Vec<FileRow<'a>>,
    selected: usize,
    pending_delete: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> FileListPopup<'a> {
    pub fn new(rows: Vec<FileRow<'a>>, theme: &'a Theme) -> Self {
        Self {
            rows,
            selected: 0,
            pending_delete: None,
            theme,
        }
    }

    pub fn with_selected(mut self, index: usize) -> Self {
        self.selected = index.min(self.rows.len().saturating_sub(1));
        self
    }

    /// Mark the row whose delete is in flight
    pub fn with_pending_delete(mut self, id: Option<&'a str>) -> Self {
        self.pending_delete = id;
        self
    }

    fn label(&self, row: &FileRow<'_>) -> String {
        if self.pending_delete == Some(row.id) {
            format!("{}{}", row.name, PENDING_MARKER)
        } else {
            row.name.to_string()
        }
    }

    fn popup_size(&self) -> (u16, u16) {
        let title_width = " Documents ".width() + 4;
        let widest = self
            .rows
            .iter()
            .map(|row| self.label(row).width() + 6)
            .max()
            .unwrap_or(0);
        let width = (title_width.max(widest).max(34) as u16).min(MAX_POPUP_WIDTH);
        let height = (self.rows.len().max(1) as u16 + 2).min(MAX_POPUP_HEIGHT);
        (width, height)
    }

    /// Render the popup centered in the given area
    pub fn render_centered(&self, area: Rect, buf: &mut Buffer) {
        let (width, height) = self.popup_size();
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let popup_area = Rect::new(x, y, width.min(area.width), height.min(area.height));

        Clear.render(popup_area, buf);

        let block = Block::default()
            .title(" Documents ")
            .title_style(self.theme.accent_bold())
            .title_bottom(Line::from(" ↑↓ move · d delete · Esc close ").right_aligned())
            .borders(Borders::ALL)
            .border_style(self.theme.accent_style());

        if self.rows.is_empty() {
            let inner = block.inner(popup_area);
            block.render(popup_area, buf);
            buf.set_span(
                inner.x + 1,
                inner.y,
                &Span::styled("No documents", self.theme.dim_style()),
                inner.width.saturating_sub(1),
            );
            return;
        }

        let items: Vec<ListItem> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let style = if i == self.selected {
                    Style::default()
                        .bg(self.theme.accent)
                        .fg(self.theme.bg)
                        .add_modifier(Modifier::BOLD)
                } else if self.pending_delete == Some(row.id) {
                    self.theme.dim_style()
                } else {
                    self.theme.base_style()
                };
                ListItem::new(Line::from(Span::styled(format!("  {}", self.label(row)), style)))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_spacing(HighlightSpacing::Always);

        let mut state = ListState::default();
        state.select(Some(self.selected));
        StatefulWidget::render(list, popup_area, buf, &mut state);
    }
}

/// Selection and visibility of the document popup
#[derive(Debug, Default)]
pub struct FileListState {
    pub selected: usize,
    pub visible: bool,
}

impl FileListState {
    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Move selection up, wrapping to the bottom
    pub fn up(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        if self.selected > 0 {
            self.selected -= 1;
        } else {
            self.selected = item_count - 1;
        }
    }

    /// Move selection down, wrapping to the top
    pub fn down(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        if self.selected < item_count - 1 {
            self.selected += 1;
        } else {
            self.selected = 0;
        }
    }

    /// Keep the selection inside a list that may have shrunk
    pub fn clamp(&mut self, item_count: usize) {
        self.selected = self.selected.min(item_count.saturating_sub(1));
    }
}
