//! Rule-based alerts over a meeting's decisions and action items.
//!
//! Alerts are disposable. Each evaluation deletes the meeting's alerts and
//! rebuilds them in one transaction, so repeated runs converge. The rules
//! themselves are pure functions over loaded rows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::RoutedAlert;
use crate::config::AlertSettings;
use crate::db::{ActionStatus, AlertKind, DbActionItem, DbDecision, DbError, DbMeeting, LedgerDb};
use crate::util::parse_ts;

/// An alert before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub kind: AlertKind,
    pub action_item_id: Option<String>,
    pub message: String,
    /// User id of whoever should hear about it.
    pub recipient_id: Option<String>,
}

/// Rebuild all rule alerts for a meeting in its own transaction.
pub fn evaluate(
    db: &LedgerDb,
    meeting_id: &str,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Result<Vec<RoutedAlert>, DbError> {
    db.with_transaction(|tx| rebuild_rule_alerts(tx, meeting_id, now, settings))
}

/// Replace the meeting's alerts with the current rule results.
/// Runs inside the caller's transaction.
pub(crate) fn rebuild_rule_alerts(
    tx: &LedgerDb,
    meeting_id: &str,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Result<Vec<RoutedAlert>, DbError> {
    let meeting = tx
        .get_meeting(meeting_id)?
        .ok_or_else(|| DbError::not_found("meeting", meeting_id))?;

    let removed = tx.delete_meeting_alerts(meeting_id)?;
    let decisions = tx.get_meeting_decisions(meeting_id)?;
    let items = tx.get_meeting_action_items(meeting_id)?;

    let mut owner_names = HashMap::new();
    for owner_id in items.iter().filter_map(|i| i.owner_id.as_deref()) {
        if owner_names.contains_key(owner_id) {
            continue;
        }
        if let Some(user) = tx.get_user(owner_id)? {
            owner_names.insert(owner_id.to_string(), user.name);
        }
    }

    let drafts = collect_rule_alerts(&meeting, &decisions, &items, &owner_names, now, settings);

    let mut routed = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let alert = tx.insert_alert(
            meeting_id,
            draft.action_item_id.as_deref(),
            draft.kind,
            &draft.message,
        )?;
        let recipient_email = tx.user_email(draft.recipient_id.as_deref())?;
        routed.push(RoutedAlert {
            alert,
            recipient_email,
        });
    }

    log::info!(
        "Alerts for meeting '{}': replaced {} with {}",
        meeting.title,
        removed,
        routed.len()
    );
    Ok(routed)
}

/// Apply every rule. Rules are independent; order is A through E.
pub fn collect_rule_alerts(
    meeting: &DbMeeting,
    decisions: &[DbDecision],
    items: &[DbActionItem],
    owner_names: &HashMap<String, String>,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();
    drafts.extend(no_owner(meeting, items));
    drafts.extend(overdue(meeting, items, now));
    drafts.extend(no_outcomes(meeting, decisions, items));
    drafts.extend(never_acknowledged(
        items,
        owner_names,
        now - settings.ack_grace(),
    ));
    drafts.extend(decision_no_owner(meeting, decisions));
    drafts
}

fn no_owner(meeting: &DbMeeting, items: &[DbActionItem]) -> Vec<AlertDraft> {
    items
        .iter()
        .filter(|item| item.owner_id.is_none())
        .map(|item| AlertDraft {
            kind: AlertKind::NoOwner,
            action_item_id: Some(item.id.clone()),
            message: format!("Action item '{}' has no owner.", item.description),
            recipient_id: meeting.owner_id.clone(),
        })
        .collect()
}

fn overdue(meeting: &DbMeeting, items: &[DbActionItem], now: DateTime<Utc>) -> Vec<AlertDraft> {
    items
        .iter()
        .filter(|item| item.status != ActionStatus::Done)
        .filter_map(|item| {
            let due = parse_ts(item.due_date.as_deref()?)?;
            if due >= now {
                return None;
            }
            let days = (now - due).num_days();
            Some(AlertDraft {
                kind: AlertKind::Overdue,
                action_item_id: Some(item.id.clone()),
                message: format!(
                    "Action item '{}' is overdue by {} days.",
                    item.description, days
                ),
                recipient_id: item.owner_id.clone().or_else(|| meeting.owner_id.clone()),
            })
        })
        .collect()
}

fn no_outcomes(
    meeting: &DbMeeting,
    decisions: &[DbDecision],
    items: &[DbActionItem],
) -> Option<AlertDraft> {
    if !decisions.is_empty() || !items.is_empty() {
        return None;
    }
    Some(AlertDraft {
        kind: AlertKind::NoOutcomes,
        action_item_id: None,
        message: format!(
            "Meeting '{}' produced no decisions or action items.",
            meeting.title
        ),
        recipient_id: meeting.owner_id.clone(),
    })
}

fn never_acknowledged(
    items: &[DbActionItem],
    owner_names: &HashMap<String, String>,
    cutoff: DateTime<Utc>,
) -> Vec<AlertDraft> {
    items
        .iter()
        .filter(|item| item.status == ActionStatus::Open && item.acknowledged_at.is_none())
        .filter_map(|item| {
            let owner_id = item.owner_id.as_deref()?;
            let created = match parse_ts(&item.created_at) {
                Some(ts) => ts,
                None => {
                    log::warn!(
                        "Action item {} has unreadable created_at '{}'",
                        item.id,
                        item.created_at
                    );
                    return None;
                }
            };
            if created >= cutoff {
                return None;
            }
            let owner_name = owner_names
                .get(owner_id)
                .map(String::as_str)
                .unwrap_or("unknown");
            Some(AlertDraft {
                kind: AlertKind::NeverAcknowledged,
                action_item_id: Some(item.id.clone()),
                message: format!(
                    "Action item '{}' assigned to {} has not been acknowledged.",
                    item.description, owner_name
                ),
                recipient_id: Some(owner_id.to_string()),
            })
        })
        .collect()
}

fn decision_no_owner(meeting: &DbMeeting, decisions: &[DbDecision]) -> Vec<AlertDraft> {
    decisions
        .iter()
        .filter(|d| d.owner_id.is_none())
        .map(|d| AlertDraft {
            kind: AlertKind::DecisionNoOwner,
            action_item_id: None,
            message: format!("Decision '{}' has no owner.", d.summary),
            recipient_id: meeting.owner_id.clone(),
        })
        .collect()
}
