use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::*;
use crate::util::{format_ts, new_id};

/// Input for inserting an action item. New items always start `open`.
#[derive(Debug, Default)]
pub struct NewActionItem<'a> {
    pub meeting_id: &'a str,
    pub description: &'a str,
    pub owner_id: Option<&'a str>,
    pub due_date: Option<DateTime<Utc>>,
    pub source_sentence: Option<&'a str>,
    pub confidence: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

pub(super) const ACTION_ITEM_COLUMNS: &str = "id, meeting_id, description, status, owner_id, \
     due_date, acknowledged_at, source_sentence, confidence, created_at";

impl LedgerDb {
    // =========================================================================
    // Decisions
    // =========================================================================

    pub fn insert_decision(
        &self,
        meeting_id: &str,
        summary: &str,
        owner_id: Option<&str>,
        source_sentence: Option<&str>,
        confidence: Option<f64>,
    ) -> Result<DbDecision, DbError> {
        let decision = DbDecision {
            id: new_id(),
            meeting_id: meeting_id.to_string(),
            summary: summary.to_string(),
            owner_id: owner_id.map(String::from),
            source_sentence: source_sentence.map(String::from),
            confidence,
            created_at: now_ts(),
        };
        self.conn.execute(
            "INSERT INTO decisions (id, meeting_id, owner_id, summary, source_sentence, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                decision.id,
                decision.meeting_id,
                decision.owner_id,
                decision.summary,
                decision.source_sentence,
                decision.confidence,
                decision.created_at,
            ],
        )?;
        Ok(decision)
    }

    pub fn get_meeting_decisions(&self, meeting_id: &str) -> Result<Vec<DbDecision>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meeting_id, summary, owner_id, source_sentence, confidence, created_at
             FROM decisions WHERE meeting_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![meeting_id], |row| {
            Ok(DbDecision {
                id: row.get(0)?,
                meeting_id: row.get(1)?,
                summary: row.get(2)?,
                owner_id: row.get(3)?,
                source_sentence: row.get(4)?,
                confidence: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Action items
    // =========================================================================

    pub fn insert_action_item(&self, input: &NewActionItem<'_>) -> Result<DbActionItem, DbError> {
        let item = DbActionItem {
            id: new_id(),
            meeting_id: input.meeting_id.to_string(),
            description: input.description.to_string(),
            status: ActionStatus::Open,
            owner_id: input.owner_id.map(String::from),
            due_date: input.due_date.map(format_ts),
            acknowledged_at: None,
            source_sentence: input.source_sentence.map(String::from),
            confidence: input.confidence,
            created_at: format_ts(input.created_at.unwrap_or_else(Utc::now)),
        };
        self.conn.execute(
            "INSERT INTO action_items (id, meeting_id, description, status, owner_id, due_date,
                                       acknowledged_at, source_sentence, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id,
                item.meeting_id,
                item.description,
                item.status.as_str(),
                item.owner_id,
                item.due_date,
                item.acknowledged_at,
                item.source_sentence,
                item.confidence,
                item.created_at,
            ],
        )?;
        Ok(item)
    }

    pub fn get_meeting_action_items(&self, meeting_id: &str) -> Result<Vec<DbActionItem>, DbError> {
        let sql = format!(
            "SELECT {ACTION_ITEM_COLUMNS} FROM action_items WHERE meeting_id = ?1
             ORDER BY created_at, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![meeting_id], Self::map_action_item_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub(super) fn map_action_item_row(row: &Row<'_>) -> rusqlite::Result<DbActionItem> {
        let status: String = row.get(3)?;
        let status = status.parse::<ActionStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;
        Ok(DbActionItem {
            id: row.get(0)?,
            meeting_id: row.get(1)?,
            description: row.get(2)?,
            status,
            owner_id: row.get(4)?,
            due_date: row.get(5)?,
            acknowledged_at: row.get(6)?,
            source_sentence: row.get(7)?,
            confidence: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    // =========================================================================
    // Risks
    // =========================================================================

    pub fn insert_risk(
        &self,
        meeting_id: &str,
        description: &str,
        source_sentence: Option<&str>,
        confidence: Option<f64>,
    ) -> Result<DbRisk, DbError> {
        let risk = DbRisk {
            id: new_id(),
            meeting_id: meeting_id.to_string(),
            description: description.to_string(),
            source_sentence: source_sentence.map(String::from),
            confidence,
            created_at: now_ts(),
        };
        self.conn.execute(
            "INSERT INTO risks (id, meeting_id, description, source_sentence, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                risk.id,
                risk.meeting_id,
                risk.description,
                risk.source_sentence,
                risk.confidence,
                risk.created_at,
            ],
        )?;
        Ok(risk)
    }

    pub fn get_meeting_risks(&self, meeting_id: &str) -> Result<Vec<DbRisk>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meeting_id, description, source_sentence, confidence, created_at
             FROM risks WHERE meeting_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![meeting_id], |row| {
            Ok(DbRisk {
                id: row.get(0)?,
                meeting_id: row.get(1)?,
                description: row.get(2)?,
                source_sentence: row.get(3)?,
                confidence: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
