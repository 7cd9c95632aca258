use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::*;
use crate::util::format_ts;

/// A row in `meeting_claims`: the run currently processing a meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbMeetingClaim {
    pub meeting_id: String,
    pub holder: String,
    pub pid: u32,
    pub claimed_at: String,
}

impl LedgerDb {
    // =========================================================================
    // Meeting claims
    // =========================================================================

    /// Insert the claim row for a meeting unless another holder owns it.
    ///
    /// Rows claimed before `stale_before` are replaced. Returns false while a
    /// live claim belongs to a different holder. Opens its own transaction.
    pub fn try_insert_meeting_claim(
        &self,
        meeting_id: &str,
        holder: &str,
        pid: u32,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        self.with_transaction(|tx| {
            let expired = tx.conn.execute(
                "DELETE FROM meeting_claims WHERE meeting_id = ?1 AND claimed_at < ?2",
                params![meeting_id, format_ts(stale_before)],
            )?;
            if expired > 0 {
                log::warn!("Replaced abandoned claim on meeting {}", meeting_id);
            }
            let inserted = tx.conn.execute(
                "INSERT OR IGNORE INTO meeting_claims (meeting_id, holder, pid, claimed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![meeting_id, holder, pid, format_ts(now)],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Remove the claim row if `holder` still owns it.
    pub fn delete_meeting_claim(&self, meeting_id: &str, holder: &str) -> Result<bool, DbError> {
        let removed = self.conn.execute(
            "DELETE FROM meeting_claims WHERE meeting_id = ?1 AND holder = ?2",
            params![meeting_id, holder],
        )?;
        Ok(removed > 0)
    }

    pub fn get_meeting_claim(&self, meeting_id: &str) -> Result<Option<DbMeetingClaim>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT meeting_id, holder, pid, claimed_at
                 FROM meeting_claims WHERE meeting_id = ?1",
                params![meeting_id],
                |row| {
                    Ok(DbMeetingClaim {
                        meeting_id: row.get(0)?,
                        holder: row.get(1)?,
                        pid: row.get(2)?,
                        claimed_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }
}
