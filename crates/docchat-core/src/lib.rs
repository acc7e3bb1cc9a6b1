//! docchat-core: client-side state for the document assistant
//!
//! This crate holds the state machines behind the interactive client: the
//! streaming query session, the pending upload batch and the remote
//! document registry. Backend access goes through the traits defined in
//! `docchat-client`, so everything here runs against in-memory fakes too.

pub mod error;
pub mod events;
pub mod refresh;
pub mod registry;
pub mod session;
pub mod transcript;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use events::{SessionEvent, SessionHandle, SessionId};
pub use refresh::RefreshToken;
pub use registry::FileRegistryView;
pub use session::StreamSessionController;
pub use transcript::{Role, Transcript, TranscriptEntry};
pub use upload::{
    Exclusion, ExclusionReason, FileCandidate, MAX_BATCH_FILES, MediaType, STATUS_TTL,
    SelectedFile, SelectionReport, SubmitOutcome, UploadBatchManager, UploadStatus,
};
