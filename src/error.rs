//! Error types for transcript processing.
//!
//! Only failures the caller can act on surface here. Generation hiccups,
//! malformed fields and notifier failures are absorbed by the pipeline and
//! show up as degraded data instead.

use thiserror::Error;

use crate::db::DbError;
use crate::intelligence::GenerationError;

/// Errors returned by a processing run.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Generation capability could not be used at all. Nothing was mutated.
    #[error("Text generation unavailable: {0}")]
    Unavailable(String),

    #[error("Transcript not found: {0}")]
    TranscriptNotFound(String),

    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    /// The extraction transaction failed and was rolled back.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

impl ProcessError {
    /// Returns true if re-invoking the same run may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessError::Storage(DbError::Sqlite(_)))
    }

    /// Returns true if the caller has to fix configuration before retrying.
    pub fn requires_user_action(&self) -> bool {
        matches!(self, ProcessError::Unavailable(_))
    }

    /// Get a user-facing recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ProcessError::Unavailable(_) => {
                "Set OPENAI_API_KEY or generation.apiKey in ~/.ledger/config.json, then re-run."
            }
            ProcessError::TranscriptNotFound(_) => "Upload a transcript for the meeting first.",
            ProcessError::MeetingNotFound(_) => "Check the meeting id.",
            ProcessError::Storage(_) => {
                "The previous extraction is intact. Re-run processing for this meeting."
            }
        }
    }
}

impl From<GenerationError> for ProcessError {
    fn from(err: GenerationError) -> Self {
        ProcessError::Unavailable(err.to_string())
    }
}
