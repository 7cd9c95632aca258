pub mod alerts;
pub mod claims;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod intelligence;
mod migrations;
pub mod notification;
pub mod processor;
pub mod util;

pub use claims::MeetingClaims;
pub use config::{AlertSettings, Config};
pub use db::LedgerDb;
pub use error::ProcessError;
pub use intelligence::{ChatCompletionsGenerator, GenerationError, TextGenerator};
pub use notification::{Notification, Notifier};
pub use processor::{ProcessSummary, TranscriptProcessor};
