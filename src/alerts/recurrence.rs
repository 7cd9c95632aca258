//! Flags risks that keep coming up in the same owner's recent meetings.
//!
//! Matching is lexical: two risks match when they share enough words after
//! lowercasing and dropping stopwords. No stemming, no punctuation handling.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::RoutedAlert;
use crate::config::AlertSettings;
use crate::db::{AlertKind, DbError, LedgerDb};

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Lowercased whitespace-separated words, minus stopwords.
pub fn meaningful_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// A risk from an earlier meeting, pre-tokenized.
#[derive(Debug, Clone)]
pub struct HistoricalRisk {
    pub meeting_id: String,
    pub words: HashSet<String>,
}

/// Historical risks sharing at least `min_overlap` words with `words`.
pub fn find_matches<'a>(
    words: &HashSet<String>,
    history: &'a [HistoricalRisk],
    min_overlap: usize,
) -> Vec<&'a HistoricalRisk> {
    history
        .iter()
        .filter(|past| words.intersection(&past.words).count() >= min_overlap)
        .collect()
}

pub fn recurrence_message(description: &str, meetings: usize) -> String {
    let noun = if meetings == 1 { "meeting" } else { "meetings" };
    format!(
        "Risk '{}' has appeared in {} recent {}. This issue keeps recurring.",
        description, meetings, noun
    )
}

/// Append `repeated_issue` alerts for the meeting's recurring risks in its
/// own transaction.
///
/// Does not clear earlier alerts. Use [`super::refresh`] to rebuild the rule
/// alerts and append these atomically.
pub fn detect(
    db: &LedgerDb,
    meeting_id: &str,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Result<Vec<RoutedAlert>, DbError> {
    db.with_transaction(|tx| append_recurring_alerts(tx, meeting_id, now, settings))
}

/// No-op when the meeting has no owner, no risks or no history in the
/// window. Runs inside the caller's transaction.
pub(crate) fn append_recurring_alerts(
    tx: &LedgerDb,
    meeting_id: &str,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Result<Vec<RoutedAlert>, DbError> {
    let meeting = tx
        .get_meeting(meeting_id)?
        .ok_or_else(|| DbError::not_found("meeting", meeting_id))?;
    let owner_id = match meeting.owner_id.as_deref() {
        Some(id) => id,
        None => return Ok(Vec::new()),
    };

    let risks = tx.get_meeting_risks(meeting_id)?;
    if risks.is_empty() {
        return Ok(Vec::new());
    }

    let since = now - settings.recurrence_window();
    let mut history = Vec::new();
    for past in tx.get_owner_meetings_since(owner_id, since, meeting_id)? {
        for risk in tx.get_meeting_risks(&past.id)? {
            history.push(HistoricalRisk {
                meeting_id: past.id.clone(),
                words: meaningful_words(&risk.description),
            });
        }
    }
    if history.is_empty() {
        return Ok(Vec::new());
    }

    let recipient_email = tx.user_email(Some(owner_id))?;

    let mut routed = Vec::new();
    for risk in &risks {
        let matches = find_matches(
            &meaningful_words(&risk.description),
            &history,
            settings.recurrence_min_overlap,
        );
        if matches.len() < settings.recurrence_min_matches {
            continue;
        }

        let meetings: HashSet<&str> = matches.iter().map(|m| m.meeting_id.as_str()).collect();
        let alert = tx.insert_alert(
            meeting_id,
            None,
            AlertKind::RepeatedIssue,
            &recurrence_message(&risk.description, meetings.len()),
        )?;
        log::info!(
            "Risk '{}' recurs across {} meetings",
            risk.description,
            meetings.len()
        );
        routed.push(RoutedAlert {
            alert,
            recipient_email: recipient_email.clone(),
        });
    }
    Ok(routed)
}
