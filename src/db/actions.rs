use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::outcomes::ACTION_ITEM_COLUMNS;
use super::*;
use crate::util::format_ts;

impl LedgerDb {
    // =========================================================================
    // Action item lifecycle
    // =========================================================================

    /// Get a single action item by its ID.
    pub fn get_action_item(&self, id: &str) -> Result<Option<DbActionItem>, DbError> {
        let sql = format!("SELECT {ACTION_ITEM_COLUMNS} FROM action_items WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::map_action_item_row)
            .optional()?)
    }

    fn require_action_item(&self, id: &str) -> Result<DbActionItem, DbError> {
        self.get_action_item(id)?
            .ok_or_else(|| DbError::not_found("action item", id))
    }

    /// Record that the owner has seen the assignment.
    ///
    /// The timestamp is written at most once and never on a done item.
    pub fn acknowledge_action_item(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<AckOutcome, DbError> {
        let item = self.require_action_item(id)?;
        if item.status == ActionStatus::Done {
            return Ok(AckOutcome::AlreadyDone);
        }
        if item.acknowledged_at.is_some() {
            return Ok(AckOutcome::AlreadyAcknowledged);
        }
        self.conn.execute(
            "UPDATE action_items SET acknowledged_at = ?1
             WHERE id = ?2 AND acknowledged_at IS NULL",
            params![format_ts(at), id],
        )?;
        Ok(AckOutcome::Acknowledged)
    }

    /// Mark an action item as done.
    pub fn mark_action_item_done(&self, id: &str) -> Result<DbActionItem, DbError> {
        self.set_action_status(id, ActionStatus::Done)
    }

    /// Reopen a done action item. Acknowledgement is kept.
    pub fn reopen_action_item(&self, id: &str) -> Result<DbActionItem, DbError> {
        self.set_action_status(id, ActionStatus::Open)
    }

    fn set_action_status(&self, id: &str, status: ActionStatus) -> Result<DbActionItem, DbError> {
        let changed = self.conn.execute(
            "UPDATE action_items SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(DbError::not_found("action item", id));
        }
        self.require_action_item(id)
    }

    /// Open, owned action items with a due date at or before `horizon`.
    ///
    /// Overdue items are included. Ordered by due date, soonest first.
    pub fn get_due_reminders(&self, horizon: DateTime<Utc>) -> Result<Vec<DbActionItem>, DbError> {
        let sql = format!(
            "SELECT {ACTION_ITEM_COLUMNS} FROM action_items
             WHERE status = 'open'
               AND owner_id IS NOT NULL
               AND due_date IS NOT NULL
               AND due_date <= ?1
             ORDER BY due_date ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![format_ts(horizon)], Self::map_action_item_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::outcomes::NewActionItem;
    use super::super::test_utils::test_db;
    use super::*;
    use chrono::Duration;

    fn seed_item(db: &LedgerDb, owner_id: Option<&str>, due: Option<DateTime<Utc>>) -> DbActionItem {
        let meeting = db.insert_meeting("Sync", None).expect("meeting");
        db.insert_action_item(&NewActionItem {
            meeting_id: &meeting.id,
            description: "Send the recap",
            owner_id,
            due_date: due,
            ..NewActionItem::default()
        })
        .expect("item")
    }

    #[test]
    fn test_acknowledge_sets_timestamp_once() {
        let db = test_db();
        let item = seed_item(&db, None, None);
        let first = Utc::now();

        assert_eq!(
            db.acknowledge_action_item(&item.id, first).expect("ack"),
            AckOutcome::Acknowledged
        );
        let stamped = db.get_action_item(&item.id).expect("get").expect("exists");

        assert_eq!(
            db.acknowledge_action_item(&item.id, first + Duration::hours(3))
                .expect("re-ack"),
            AckOutcome::AlreadyAcknowledged
        );
        let again = db.get_action_item(&item.id).expect("get").expect("exists");
        assert_eq!(stamped.acknowledged_at, again.acknowledged_at);
    }

    #[test]
    fn test_acknowledge_done_item_is_noop() {
        let db = test_db();
        let item = seed_item(&db, None, None);
        db.mark_action_item_done(&item.id).expect("done");

        assert_eq!(
            db.acknowledge_action_item(&item.id, Utc::now()).expect("ack"),
            AckOutcome::AlreadyDone
        );
        let stored = db.get_action_item(&item.id).expect("get").expect("exists");
        assert!(stored.acknowledged_at.is_none());
    }

    #[test]
    fn test_done_then_reopen() {
        let db = test_db();
        let item = seed_item(&db, None, None);
        assert_eq!(
            db.mark_action_item_done(&item.id).expect("done").status,
            ActionStatus::Done
        );
        assert_eq!(
            db.reopen_action_item(&item.id).expect("reopen").status,
            ActionStatus::Open
        );
    }

    #[test]
    fn test_lifecycle_on_missing_item_is_not_found() {
        let db = test_db();
        assert!(matches!(
            db.mark_action_item_done("ghost"),
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            db.acknowledge_action_item("ghost", Utc::now()),
            Err(DbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_due_reminders_window() {
        let db = test_db();
        let owner = db.create_user("Gus", "gus@corp.com").expect("user");
        let now = Utc::now();

        let overdue = seed_item(&db, Some(&owner.id), Some(now - Duration::days(2)));
        let tomorrow = seed_item(&db, Some(&owner.id), Some(now + Duration::hours(20)));
        seed_item(&db, Some(&owner.id), Some(now + Duration::days(5)));
        seed_item(&db, None, Some(now));
        let finished = seed_item(&db, Some(&owner.id), Some(now - Duration::days(1)));
        db.mark_action_item_done(&finished.id).expect("done");

        let due = db.get_due_reminders(now + Duration::days(1)).expect("query");
        let ids: Vec<&str> = due.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![overdue.id.as_str(), tomorrow.id.as_str()]);
    }
}
