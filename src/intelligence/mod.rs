//! Text-generation capability used for extraction.
//!
//! The pipeline only sees the [`TextGenerator`] trait. Callers construct a
//! concrete generator (usually [`ChatCompletionsGenerator`]) and pass it in;
//! construction is where a missing credential is reported.

use thiserror::Error;

pub mod openai;
pub mod prompts;

pub use openai::ChatCompletionsGenerator;
pub use prompts::*;

/// Errors raised by a text generator.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The capability cannot be used at all (missing or rejected credentials).
    #[error("{0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: HTTP {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Empty response")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl GenerationError {
    /// Returns true if the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Http(_) | GenerationError::EmptyResponse => true,
            GenerationError::Api { status, .. } => *status == 429 || *status >= 500,
            GenerationError::Unavailable(_) | GenerationError::Malformed(_) => false,
        }
    }
}

/// Something that turns a system prompt plus transcript into structured JSON.
pub trait TextGenerator {
    fn generate(
        &self,
        system_prompt: &str,
        transcript: &str,
    ) -> Result<serde_json::Value, GenerationError>;
}
