//! Session event types

use docchat_client::TerminateReason;
use std::fmt;

use crate::transcript::TranscriptEntry;

/// Identifies one query session within a controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returned by `begin` when a session actually started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    pub query: String,
}

/// Progress of the live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A chunk arrived; `text` is the whole partial answer so far
    Partial {
        session: SessionId,
        chunk: String,
        text: String,
    },

    /// The channel terminated and the answer was added to the transcript
    Finished {
        session: SessionId,
        entry: TranscriptEntry,
        reason: TerminateReason,
    },
}
