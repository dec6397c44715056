use thiserror::Error;

use crate::validation::ValidationFailure;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("{0} responded with success=false")]
    Rejected(String),

    #[error("no admin credential stored; sign in first")]
    MissingCredential,

    #[error("{}: {}", .0.msg, .0.errors.join("; "))]
    Validation(ValidationFailure),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("audio playback failed: {0}")]
    Audio(String),

    #[error("local storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("local state is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("nothing to export")]
    EmptyExport,

    #[error("csv writer failed: {0}")]
    Csv(#[from] csv::Error),
}

impl AdminError {
    /// True for failures the next poll cycle may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdminError::Transport(_) | AdminError::Status { .. } | AdminError::Rejected(_)
        )
    }
}
