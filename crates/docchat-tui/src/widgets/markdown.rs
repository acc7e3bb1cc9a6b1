//! Markdown rendering for terminal UI
//!
//! Answers come from a remote service, so the renderer only understands a
//! safe subset: raw HTML is shown as literal text and terminal control
//! characters are removed before parsing.

use crate::theme::Theme;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Strip terminal control characters, keeping newlines and expanding tabs
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Cut `text` to at most `width` display columns, marking the cut with `…`
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Word-wrap a styled line to `width` columns, keeping span styles.
///
/// A single word wider than `width` is left on its own line.
pub fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line];
    }
    let mut out = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;
    for span in line.spans {
        for word in span.content.split_inclusive(' ') {
            let w = word.width();
            if used > 0 && used + w.min(word.trim_end().width()) > width {
                out.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            current.push(Span::styled(word.to_string(), span.style));
            used += w;
        }
    }
    if !current.is_empty() {
        out.push(Line::from(current));
    }
    out
}

fn flush<'a>(lines: &mut Vec<Line<'a>>, current_line: &mut Vec<Span<'a>>) {
    if !current_line.is_empty() {
        lines.push(Line::from(std::mem::take(current_line)));
    }
}

/// Convert markdown text to styled ratatui Lines
pub fn render_markdown<'a>(text: &str, theme: &Theme, width: usize) -> Vec<Line<'a>> {
    let clean = sanitize(text);
    let mut lines: Vec<Line<'a>> = Vec::new();
    let mut current_line: Vec<Span<'a>> = Vec::new();
    let mut current_style = theme.base_style();
    let mut in_code_block = false;
    let mut code_block_content = String::new();
    let mut list_depth: usize = 0;

    let parser = Parser::new(&clean);

    for event in parser {
        match event {
            Event::Start(tag) => match tag {
                Tag::Heading { level, .. } => {
                    flush(&mut lines, &mut current_line);
                    current_style = match level {
                        pulldown_cmark::HeadingLevel::H1 => theme
                            .accent_style()
                            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                        pulldown_cmark::HeadingLevel::H2 => {
                            theme.accent_style().add_modifier(Modifier::BOLD)
                        }
                        _ => theme.accent_style(),
                    };
                }
                Tag::Paragraph | Tag::HtmlBlock => {
                    flush(&mut lines, &mut current_line);
                }
                Tag::CodeBlock(_) => {
                    in_code_block = true;
                    code_block_content.clear();
                    flush(&mut lines, &mut current_line);
                }
                Tag::List(_) => {
                    list_depth += 1;
                }
                Tag::Item => {
                    flush(&mut lines, &mut current_line);
                    let indent = "  ".repeat(list_depth.saturating_sub(1));
                    current_line.push(Span::styled(format!("{}• ", indent), theme.dim_style()));
                }
                Tag::Emphasis => {
                    current_style = current_style.add_modifier(Modifier::ITALIC);
                }
                Tag::Strong => {
                    current_style = current_style.add_modifier(Modifier::BOLD);
                }
                Tag::Strikethrough => {
                    current_style = current_style.add_modifier(Modifier::CROSSED_OUT);
                }
                Tag::Link { .. } => {
                    current_style = Style::default().fg(theme.link);
                }
                _ => {}
            },
            Event::End(tag_end) => match tag_end {
                TagEnd::Heading(_) => {
                    flush(&mut lines, &mut current_line);
                    current_style = theme.base_style();
                }
                TagEnd::Paragraph | TagEnd::HtmlBlock => {
                    flush(&mut lines, &mut current_line);
                    lines.push(Line::from(""));
                }
                TagEnd::CodeBlock => {
                    in_code_block = false;
                    let code_style = theme.code_style().add_modifier(Modifier::DIM);
                    for code_line in code_block_content.lines() {
                        let display_line = truncate_to_width(code_line, width.saturating_sub(2));
                        lines.push(Line::from(Span::styled(
                            format!("  {}", display_line),
                            code_style,
                        )));
                    }
                    lines.push(Line::from(""));
                }
                TagEnd::List(_) => {
                    list_depth = list_depth.saturating_sub(1);
                    if list_depth == 0 {
                        lines.push(Line::from(""));
                    }
                }
                TagEnd::Item => {
                    flush(&mut lines, &mut current_line);
                }
                TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                    current_style = theme.base_style();
                }
                _ => {}
            },
            Event::Text(text) => {
                if in_code_block {
                    code_block_content.push_str(&text);
                } else {
                    current_line.push(Span::styled(text.to_string(), current_style));
                }
            }
            Event::Code(code) => {
                let code_style = theme.code_style().add_modifier(Modifier::BOLD);
                current_line.push(Span::styled(format!("`{}`", code), code_style));
            }
            // Markup is displayed, never interpreted.
            Event::Html(html) => {
                for (i, raw) in html.split('\n').enumerate() {
                    if i > 0 {
                        flush(&mut lines, &mut current_line);
                    }
                    if !raw.is_empty() {
                        current_line.push(Span::styled(raw.to_string(), theme.dim_style()));
                    }
                }
            }
            Event::InlineHtml(html) => {
                current_line.push(Span::styled(html.to_string(), current_style));
            }
            Event::SoftBreak => {
                current_line.push(Span::raw(" "));
            }
            Event::HardBreak => {
                flush(&mut lines, &mut current_line);
            }
            _ => {}
        }
    }

    if !current_line.is_empty() {
        lines.push(Line::from(current_line));
    }

    // Remove trailing empty lines
    while lines.last().is_some_and(|l| {
        l.spans.is_empty() || (l.spans.len() == 1 && l.spans[0].content.is_empty())
    }) {
        lines.pop();
    }

    lines
}
