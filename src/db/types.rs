//! Shared type definitions for the database layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl DbError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        DbError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// A row from the `meetings` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMeeting {
    pub id: String,
    pub title: String,
    pub owner_id: Option<String>,
    pub platform: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: String,
    /// UTC timestamp of the last completed extraction run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,
}

/// A row from the `transcripts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTranscript {
    pub id: String,
    pub meeting_id: String,
    pub content: String,
    pub created_at: String,
}

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Opaque credential hash. Never produced by the extraction pipeline.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: String,
}

/// A row from the `decisions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDecision {
    pub id: String,
    pub meeting_id: String,
    pub summary: String,
    pub owner_id: Option<String>,
    pub source_sentence: Option<String>,
    pub confidence: Option<f64>,
    pub created_at: String,
}

/// Lifecycle state of an action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Open,
    Done,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Open => "open",
            ActionStatus::Done => "done",
        }
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ActionStatus::Open),
            "done" => Ok(ActionStatus::Done),
            other => Err(format!("unknown action status '{other}'")),
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `action_items` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbActionItem {
    pub id: String,
    pub meeting_id: String,
    pub description: String,
    pub status: ActionStatus,
    pub owner_id: Option<String>,
    pub due_date: Option<String>,
    pub acknowledged_at: Option<String>,
    pub source_sentence: Option<String>,
    pub confidence: Option<f64>,
    pub created_at: String,
}

/// A row from the `risks` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbRisk {
    pub id: String,
    pub meeting_id: String,
    pub description: String,
    pub source_sentence: Option<String>,
    pub confidence: Option<f64>,
    pub created_at: String,
}

/// Alert type tag, persisted as its snake_case string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NoOwner,
    Overdue,
    NoOutcomes,
    NeverAcknowledged,
    DecisionNoOwner,
    RepeatedIssue,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::NoOwner => "no_owner",
            AlertKind::Overdue => "overdue",
            AlertKind::NoOutcomes => "no_outcomes",
            AlertKind::NeverAcknowledged => "never_acknowledged",
            AlertKind::DecisionNoOwner => "decision_no_owner",
            AlertKind::RepeatedIssue => "repeated_issue",
        }
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_owner" => Ok(AlertKind::NoOwner),
            "overdue" => Ok(AlertKind::Overdue),
            "no_outcomes" => Ok(AlertKind::NoOutcomes),
            "never_acknowledged" => Ok(AlertKind::NeverAcknowledged),
            "decision_no_owner" => Ok(AlertKind::DecisionNoOwner),
            "repeated_issue" => Ok(AlertKind::RepeatedIssue),
            other => Err(format!("unknown alert type '{other}'")),
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `alerts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAlert {
    pub id: String,
    pub meeting_id: String,
    pub action_item_id: Option<String>,
    pub kind: AlertKind,
    pub message: String,
    pub created_at: String,
}

/// Outcome of an acknowledge request on an action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Timestamp was written by this call.
    Acknowledged,
    /// Item was already acknowledged; timestamp left untouched.
    AlreadyAcknowledged,
    /// Item is done; nothing to acknowledge.
    AlreadyDone,
}
