//! Transcript processing pipeline.
//!
//! Raw transcript → generator → [`normalize`] → stored outcomes → hooks.

pub mod hooks;
pub mod normalize;
pub mod transcript;

pub use hooks::HookResult;
pub use normalize::{normalize, ActionCandidate, EntryError, Extraction, TextEntry};
pub use transcript::{ProcessSummary, TranscriptProcessor};
