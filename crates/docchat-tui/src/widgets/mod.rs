//! Custom widgets for the TUI

pub mod batch;
pub mod file_list;
pub mod input_box;
pub mod markdown;
pub mod message_list;
pub mod spinner;

pub use batch::{BatchStrip, StripStatus};
pub use file_list::{FileListPopup, FileListState, FileRow};
pub use input_box::InputBox;
pub use message_list::{ChatMessage, MessageList, MessageRole};
pub use spinner::Spinner;
