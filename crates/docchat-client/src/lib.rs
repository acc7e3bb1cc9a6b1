//! docchat-client: HTTP client for the document assistant backend
//!
//! This crate speaks the backend's wire protocol: the server-sent query
//! stream, multipart document upload, document listing and deletion. The
//! [`QueryTransport`] and [`DocumentStore`] traits are the seams the rest of
//! the workspace programs against.

pub mod backend;
pub mod error;
pub mod http;
pub mod stream;
pub mod types;

pub use backend::{DocumentStore, QueryTransport};
pub use error::{Error, Result};
pub use http::{BackendClient, DEFAULT_BASE_URL};
pub use stream::{ChannelEvent, ChannelStream, TerminateReason};
pub use types::*;
