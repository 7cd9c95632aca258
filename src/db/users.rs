use rusqlite::{params, OptionalExtension, Row};

use super::*;
use crate::util::new_id;

impl LedgerDb {
    // =========================================================================
    // Users (identities)
    // =========================================================================

    /// Insert a new identity. Fails on a duplicate email.
    pub fn create_user(&self, name: &str, email: &str) -> Result<DbUser, DbError> {
        let user = DbUser {
            id: new_id(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: None,
            created_at: now_ts(),
        };
        self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.name, user.email, user.password_hash, user.created_at],
        )?;
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<DbUser>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?1",
                params![id],
                Self::map_user_row,
            )
            .optional()?)
    }

    /// Exact email match.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<DbUser>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?1",
                params![email],
                Self::map_user_row,
            )
            .optional()?)
    }

    /// Exact, case-sensitive name match. Oldest identity wins when names repeat.
    pub fn get_user_by_name(&self, name: &str) -> Result<Option<DbUser>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email, password_hash, created_at FROM users
                 WHERE name = ?1
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1",
                params![name],
                Self::map_user_row,
            )
            .optional()?)
    }

    /// Email for a user id, if both the id and the user exist.
    pub fn user_email(&self, id: Option<&str>) -> Result<Option<String>, DbError> {
        match id {
            Some(id) => Ok(self.get_user(id)?.map(|u| u.email)),
            None => Ok(None),
        }
    }

    pub(super) fn map_user_row(row: &Row<'_>) -> rusqlite::Result<DbUser> {
        Ok(DbUser {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
