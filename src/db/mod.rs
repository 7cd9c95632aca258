//! SQLite-backed store for meetings, transcripts, extracted outcomes and alerts.
//!
//! The database lives at `~/.ledger/ledger.db` unless the config points
//! elsewhere. Every entity the pipeline touches lives here, including the
//! identities that owner names resolve to. Query methods are split by entity
//! across the submodules, all as `impl LedgerDb` blocks.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::util::now_ts;

pub mod types;
pub use types::*;

pub struct LedgerDb {
    conn: Connection,
}

impl LedgerDb {
    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    ///
    /// Not re-entrant: the closure must not call another `with_transaction`.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(DbError::from)?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(DbError::from(e).into());
                }
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Run a closure inside a named savepoint of the current transaction.
    ///
    /// A failing closure rolls back only its own writes; the enclosing
    /// transaction stays open. `name` must be a plain SQL identifier.
    pub fn with_savepoint<F, T, E>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {name}"))
            .map_err(DbError::from)?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch(&format!("RELEASE {name}"))
                    .map_err(DbError::from)?;
                Ok(val)
            }
            Err(e) => {
                let _ = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"));
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.ledger/ledger.db` and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL keeps readers unblocked while a processing run holds the write lock
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        log::debug!("Opened ledger database at {}", path.display());
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.ledger/ledger.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".ledger").join("ledger.db"))
    }

    /// Open the database named by the config, falling back to the default path.
    pub fn open_configured(path: Option<&Path>) -> Result<Self, DbError> {
        match path {
            Some(p) => Self::open_at(p.to_path_buf()),
            None => Self::open(),
        }
    }

    /// Delete every extracted outcome (decisions, action items, risks) for a meeting.
    ///
    /// Alerts that reference the deleted action items are removed first so the
    /// foreign key on `alerts.action_item_id` never blocks the rebuild.
    pub fn clear_meeting_outcomes(&self, meeting_id: &str) -> Result<usize, DbError> {
        self.conn.execute(
            "DELETE FROM alerts WHERE action_item_id IN
                (SELECT id FROM action_items WHERE meeting_id = ?1)",
            params![meeting_id],
        )?;
        let mut removed = 0;
        removed += self.conn.execute(
            "DELETE FROM decisions WHERE meeting_id = ?1",
            params![meeting_id],
        )?;
        removed += self.conn.execute(
            "DELETE FROM action_items WHERE meeting_id = ?1",
            params![meeting_id],
        )?;
        removed += self
            .conn
            .execute("DELETE FROM risks WHERE meeting_id = ?1", params![meeting_id])?;
        Ok(removed)
    }

    /// Stamp the meeting's last completed extraction time.
    pub fn mark_meeting_extracted(&self, meeting_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE meetings SET extracted_at = ?1 WHERE id = ?2",
            params![now_ts(), meeting_id],
        )?;
        Ok(())
    }
}

pub mod actions;
pub mod alerts;
pub mod claims;
pub mod meetings;
pub mod outcomes;
pub mod users;

pub use claims::DbMeetingClaim;
pub use meetings::NewMeeting;
pub use outcomes::NewActionItem;

// =============================================================================
// Shared test utilities
// =============================================================================
