//! Error types for docchat-core

use thiserror::Error;

/// Result type alias using docchat-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in client-side operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend client
    #[error(transparent)]
    Client(#[from] docchat_client::Error),

    /// `submit` was called while another submission is outstanding
    #[error("An upload is already in progress")]
    SubmissionInFlight,

    /// `delete_one` was called while another delete is outstanding
    #[error("Already deleting {0}")]
    DeleteInFlight(String),
}

impl Error {
    /// Whether the operation was refused because another one is running
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::SubmissionInFlight | Error::DeleteInFlight(_))
    }
}
