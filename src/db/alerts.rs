use rusqlite::params;

use super::*;
use crate::util::new_id;

impl LedgerDb {
    // =========================================================================
    // Alerts
    // =========================================================================

    pub fn delete_meeting_alerts(&self, meeting_id: &str) -> Result<usize, DbError> {
        Ok(self
            .conn
            .execute("DELETE FROM alerts WHERE meeting_id = ?1", params![meeting_id])?)
    }

    pub fn insert_alert(
        &self,
        meeting_id: &str,
        action_item_id: Option<&str>,
        kind: AlertKind,
        message: &str,
    ) -> Result<DbAlert, DbError> {
        let alert = DbAlert {
            id: new_id(),
            meeting_id: meeting_id.to_string(),
            action_item_id: action_item_id.map(String::from),
            kind,
            message: message.to_string(),
            created_at: now_ts(),
        };
        self.conn.execute(
            "INSERT INTO alerts (id, meeting_id, action_item_id, type, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                alert.id,
                alert.meeting_id,
                alert.action_item_id,
                alert.kind.as_str(),
                alert.message,
                alert.created_at,
            ],
        )?;
        Ok(alert)
    }

    pub fn get_meeting_alerts(&self, meeting_id: &str) -> Result<Vec<DbAlert>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meeting_id, action_item_id, type, message, created_at
             FROM alerts WHERE meeting_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![meeting_id], |row| {
            let kind: String = row.get(3)?;
            let kind = kind.parse::<AlertKind>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
                )
            })?;
            Ok(DbAlert {
                id: row.get(0)?,
                meeting_id: row.get(1)?,
                action_item_id: row.get(2)?,
                kind,
                message: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
