//! Query channel event types

use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

/// Why a query channel stopped delivering chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateReason {
    /// The server closed the stream
    Completed,
    /// The connection failed, before or during streaming
    Failed(String),
}

impl TerminateReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, TerminateReason::Failed(_))
    }
}

impl fmt::Display for TerminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminateReason::Completed => f.write_str("completed"),
            TerminateReason::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Events delivered by an open query channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One text chunk, exactly as the server sent it
    Chunk(String),
    /// The channel is done; nothing follows this event
    Terminated(TerminateReason),
}

/// A stream of query channel events
pub type ChannelStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;
