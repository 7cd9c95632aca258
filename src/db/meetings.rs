use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::*;
use crate::util::{format_ts, new_id};

/// Input for creating a meeting. `created_at` defaults to now.
#[derive(Debug, Default)]
pub struct NewMeeting<'a> {
    pub title: &'a str,
    pub owner_id: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub start_time: Option<&'a str>,
    pub end_time: Option<&'a str>,
    pub created_at: Option<DateTime<Utc>>,
}

const MEETING_COLUMNS: &str =
    "id, title, owner_id, platform, start_time, end_time, created_at, extracted_at";

impl LedgerDb {
    // =========================================================================
    // Meetings
    // =========================================================================

    pub fn create_meeting(&self, input: &NewMeeting<'_>) -> Result<DbMeeting, DbError> {
        let meeting = DbMeeting {
            id: new_id(),
            title: input.title.to_string(),
            owner_id: input.owner_id.map(String::from),
            platform: input.platform.map(String::from),
            start_time: input.start_time.map(String::from),
            end_time: input.end_time.map(String::from),
            created_at: format_ts(input.created_at.unwrap_or_else(Utc::now)),
            extracted_at: None,
        };
        self.conn.execute(
            "INSERT INTO meetings (id, title, owner_id, platform, start_time, end_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                meeting.id,
                meeting.title,
                meeting.owner_id,
                meeting.platform,
                meeting.start_time,
                meeting.end_time,
                meeting.created_at,
            ],
        )?;
        Ok(meeting)
    }

    /// Shorthand for a meeting with just a title and optional owner.
    pub fn insert_meeting(&self, title: &str, owner_id: Option<&str>) -> Result<DbMeeting, DbError> {
        self.create_meeting(&NewMeeting {
            title,
            owner_id,
            ..NewMeeting::default()
        })
    }

    pub fn get_meeting(&self, id: &str) -> Result<Option<DbMeeting>, DbError> {
        let sql = format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::map_meeting_row)
            .optional()?)
    }

    pub fn list_meetings(&self) -> Result<Vec<DbMeeting>, DbError> {
        let sql = format!("SELECT {MEETING_COLUMNS} FROM meetings ORDER BY created_at DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_meeting_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Other meetings owned by `owner_id` created at or after `since`.
    pub fn get_owner_meetings_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
        exclude_meeting_id: &str,
    ) -> Result<Vec<DbMeeting>, DbError> {
        let sql = format!(
            "SELECT {MEETING_COLUMNS} FROM meetings
             WHERE owner_id = ?1 AND created_at >= ?2 AND id != ?3
             ORDER BY created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![owner_id, format_ts(since), exclude_meeting_id],
            Self::map_meeting_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_meeting_row(row: &Row<'_>) -> rusqlite::Result<DbMeeting> {
        Ok(DbMeeting {
            id: row.get(0)?,
            title: row.get(1)?,
            owner_id: row.get(2)?,
            platform: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            created_at: row.get(6)?,
            extracted_at: row.get(7)?,
        })
    }

    // =========================================================================
    // Participants
    // =========================================================================

    /// Record a user as a meeting participant. Re-adding updates the role.
    pub fn add_participant(
        &self,
        meeting_id: &str,
        user_id: &str,
        role: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO meeting_participants (meeting_id, user_id, role)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(meeting_id, user_id) DO UPDATE SET
                role = COALESCE(excluded.role, meeting_participants.role)",
            params![meeting_id, user_id, role],
        )?;
        Ok(())
    }

    /// Participants of a meeting with their role, ordered by name.
    pub fn get_participants(
        &self,
        meeting_id: &str,
    ) -> Result<Vec<(DbUser, Option<String>)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.name, u.email, u.password_hash, u.created_at, mp.role
             FROM meeting_participants mp
             JOIN users u ON u.id = mp.user_id
             WHERE mp.meeting_id = ?1
             ORDER BY u.name",
        )?;
        let rows = stmt.query_map(params![meeting_id], |row| {
            Ok((Self::map_user_row(row)?, row.get::<_, Option<String>>(5)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Transcripts
    // =========================================================================

    /// Store the transcript for a meeting, replacing the content of any
    /// existing one. The transcript id survives replacement.
    pub fn upsert_transcript(&self, meeting_id: &str, content: &str) -> Result<DbTranscript, DbError> {
        if self.get_meeting(meeting_id)?.is_none() {
            return Err(DbError::not_found("meeting", meeting_id));
        }
        if let Some(mut existing) = self.get_meeting_transcript(meeting_id)? {
            self.conn.execute(
                "UPDATE transcripts SET content = ?1 WHERE id = ?2",
                params![content, existing.id],
            )?;
            existing.content = content.to_string();
            return Ok(existing);
        }

        let transcript = DbTranscript {
            id: new_id(),
            meeting_id: meeting_id.to_string(),
            content: content.to_string(),
            created_at: now_ts(),
        };
        self.conn.execute(
            "INSERT INTO transcripts (id, meeting_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                transcript.id,
                transcript.meeting_id,
                transcript.content,
                transcript.created_at
            ],
        )?;
        Ok(transcript)
    }

    pub fn get_transcript(&self, id: &str) -> Result<Option<DbTranscript>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, meeting_id, content, created_at FROM transcripts WHERE id = ?1",
                params![id],
                Self::map_transcript_row,
            )
            .optional()?)
    }

    pub fn get_meeting_transcript(&self, meeting_id: &str) -> Result<Option<DbTranscript>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, meeting_id, content, created_at FROM transcripts WHERE meeting_id = ?1",
                params![meeting_id],
                Self::map_transcript_row,
            )
            .optional()?)
    }

    fn map_transcript_row(row: &Row<'_>) -> rusqlite::Result<DbTranscript> {
        Ok(DbTranscript {
            id: row.get(0)?,
            meeting_id: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}
