//! docchat-tui: Terminal UI components
//!
//! Widgets for the document assistant's terminal client, built on ratatui
//! and crossterm. Nothing here talks to the backend; callers feed plain
//! data in and render.

pub mod input;
pub mod theme;
pub mod widgets;

pub use theme::Theme;
