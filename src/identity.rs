//! Resolves free-text person names to durable user identities.
//!
//! Matching is exact: `"alice"` and `"Alice"` are different names. The
//! placeholder email lowercases, though, and the `users.email` column is
//! unique. When a new name's placeholder is already taken, the existing
//! holder is reused: `"alice"` is attributed to `"Alice"`. That is a
//! misattribution accepted to keep extraction from failing, not a match.

use crate::db::{DbError, DbUser, LedgerDb};

const PLACEHOLDER_DOMAIN: &str = "example.com";

/// Deterministic email for an identity created from a name alone.
///
/// Example: "Mary Ann" → "mary.ann@example.com"
pub fn placeholder_email(name: &str) -> String {
    format!("{}@{}", name.to_lowercase().replace(' ', "."), PLACEHOLDER_DOMAIN)
}

/// Derive a display name from an email address (best-effort).
///
/// Example: "sarah.chen@acme.com" → "Sarah Chen"
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local
        .split(|c: char| c == '.' || c == '_' || c == '-' || c == '+')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve an owner name to a user id, creating the identity if needed.
///
/// Blank names resolve to no owner. A name with no exact match reuses the
/// user that already holds its placeholder email, if any, even though that
/// user has a different name.
pub fn resolve_owner(db: &LedgerDb, name: Option<&str>) -> Result<Option<String>, DbError> {
    let name = match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => return Ok(None),
    };

    if let Some(user) = db.get_user_by_name(name)? {
        return Ok(Some(user.id));
    }

    let email = placeholder_email(name);
    if let Some(user) = db.get_user_by_email(&email)? {
        log::warn!(
            "Owner '{}' shares placeholder email {} with '{}', attributing to the existing identity",
            name,
            email,
            user.name
        );
        return Ok(Some(user.id));
    }

    let user = db.create_user(name, &email)?;
    log::info!("Created identity '{}' <{}>", user.name, user.email);
    Ok(Some(user.id))
}

/// Resolve a participant, preferring the email when one is known.
///
/// A blank name on the email path is derived from the address.
pub fn resolve_participant(
    db: &LedgerDb,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<Option<DbUser>, DbError> {
    let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) => e,
        None => {
            return match resolve_owner(db, name)? {
                Some(id) => db.get_user(&id),
                None => Ok(None),
            };
        }
    };

    if let Some(user) = db.get_user_by_email(email)? {
        return Ok(Some(user));
    }

    let display = match name.filter(|n| !n.trim().is_empty()) {
        Some(n) => n.to_string(),
        None => name_from_email(email),
    };
    let user = db.create_user(&display, email)?;
    log::info!("Created identity '{}' <{}>", user.name, user.email);
    Ok(Some(user))
}

/// Record a participant on a meeting, resolving or creating their identity.
pub fn add_meeting_participant(
    db: &LedgerDb,
    meeting_id: &str,
    name: Option<&str>,
    email: Option<&str>,
    role: Option<&str>,
) -> Result<Option<DbUser>, DbError> {
    if db.get_meeting(meeting_id)?.is_none() {
        return Err(DbError::not_found("meeting", meeting_id));
    }
    let user = resolve_participant(db, name, email)?;
    if let Some(ref user) = user {
        db.add_participant(meeting_id, &user.id, role)?;
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    #[test]
    fn test_placeholder_email() {
        assert_eq!(placeholder_email("Mary Ann"), "mary.ann@example.com");
        assert_eq!(placeholder_email("Bob"), "bob@example.com");
    }

    #[test]
    fn test_name_from_email() {
        assert_eq!(name_from_email("sarah.chen@acme.com"), "Sarah Chen");
        assert_eq!(name_from_email("joe_smith@bigcorp.io"), "Joe Smith");
    }

    #[test]
    fn test_resolve_owner_creates_then_reuses() {
        let db = test_db();
        let first = resolve_owner(&db, Some("Alice")).expect("resolve").expect("id");
        let second = resolve_owner(&db, Some("Alice")).expect("resolve").expect("id");
        assert_eq!(first, second);

        let user = db.get_user(&first).expect("get").expect("user");
        assert_eq!(user.email, "alice@example.com");
        assert!(user.password_hash.is_none());
    }

    #[test]
    fn test_blank_owner_is_none() {
        let db = test_db();
        assert_eq!(resolve_owner(&db, None).expect("none"), None);
        assert_eq!(resolve_owner(&db, Some("")).expect("empty"), None);
        assert_eq!(resolve_owner(&db, Some("   ")).expect("blank"), None);
    }

    #[test]
    fn test_existing_user_matched_by_name() {
        let db = test_db();
        let existing = db.create_user("Dana", "dana@corp.io").expect("user");
        let id = resolve_owner(&db, Some("Dana")).expect("resolve");
        assert_eq!(id, Some(existing.id));
    }

    #[test]
    fn test_case_variant_reuses_placeholder_holder() {
        let db = test_db();
        let upper = resolve_owner(&db, Some("Alice")).expect("resolve");
        let lower = resolve_owner(&db, Some("alice")).expect("resolve");
        assert_eq!(upper, lower);
        assert!(db.get_user_by_name("alice").expect("lookup").is_none());
    }

    #[test]
    fn test_participant_prefers_email() {
        let db = test_db();
        let existing = db.create_user("Sarah C.", "sarah.chen@acme.com").expect("user");
        let user = resolve_participant(&db, Some("Sarah Chen"), Some("sarah.chen@acme.com"))
            .expect("resolve")
            .expect("user");
        assert_eq!(user.id, existing.id);
    }

    #[test]
    fn test_participant_name_derived_from_email() {
        let db = test_db();
        let user = resolve_participant(&db, None, Some("joe_smith@bigcorp.io"))
            .expect("resolve")
            .expect("user");
        assert_eq!(user.name, "Joe Smith");
        assert_eq!(user.email, "joe_smith@bigcorp.io");
    }

    #[test]
    fn test_add_meeting_participant_records_role() {
        let db = test_db();
        let meeting = db.insert_meeting("Sync", None).expect("meeting");
        let user = add_meeting_participant(&db, &meeting.id, Some("Bob"), None, Some("host"))
            .expect("add")
            .expect("user");
        let participants = db.get_participants(&meeting.id).expect("list");
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].0.id, user.id);
        assert_eq!(participants[0].1.as_deref(), Some("host"));
    }

    #[test]
    fn test_add_participant_to_missing_meeting() {
        let db = test_db();
        let err = add_meeting_participant(&db, "nope", Some("Bob"), None, None)
            .expect_err("missing meeting");
        assert!(matches!(err, DbError::NotFound { entity: "meeting", .. }));
    }
}
