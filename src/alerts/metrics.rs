//! Per-meeting productivity metrics over the stored outcomes.

use serde::Serialize;

use crate::db::{DbActionItem, DbDecision, DbError, LedgerDb};
use crate::util::parse_ts;

const DECISION_WEIGHT: usize = 2;
const OWNED_ACTION_WEIGHT: usize = 3;
const UNOWNED_ACTION_WEIGHT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingClassification {
    /// No decisions and no action items.
    WasteOfTime,
    /// Decisions were made but nobody took an action.
    NeedsFollowUp,
    Productive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingMetrics {
    pub meeting_id: String,
    pub decisions: usize,
    pub action_items: usize,
    pub actions_with_owner: usize,
    pub actions_without_owner: usize,
    pub has_outcomes: bool,
    pub productivity_score: usize,
    pub classification: MeetingClassification,
    /// Mean hours from creation to acknowledgement, one decimal. `None` when
    /// no item has been acknowledged.
    pub avg_followup_hours: Option<f64>,
}

/// Load a meeting's outcomes and compute its metrics.
pub fn meeting_metrics(db: &LedgerDb, meeting_id: &str) -> Result<MeetingMetrics, DbError> {
    if db.get_meeting(meeting_id)?.is_none() {
        return Err(DbError::not_found("meeting", meeting_id));
    }
    let decisions = db.get_meeting_decisions(meeting_id)?;
    let items = db.get_meeting_action_items(meeting_id)?;
    Ok(calculate_metrics(meeting_id, &decisions, &items))
}

/// Calculate metrics from already-loaded rows.
pub fn calculate_metrics(
    meeting_id: &str,
    decisions: &[DbDecision],
    items: &[DbActionItem],
) -> MeetingMetrics {
    let actions_with_owner = items.iter().filter(|i| i.owner_id.is_some()).count();
    let actions_without_owner = items.len() - actions_with_owner;

    let classification = match (decisions.is_empty(), items.is_empty()) {
        (true, true) => MeetingClassification::WasteOfTime,
        (false, true) => MeetingClassification::NeedsFollowUp,
        _ => MeetingClassification::Productive,
    };

    MeetingMetrics {
        meeting_id: meeting_id.to_string(),
        decisions: decisions.len(),
        action_items: items.len(),
        actions_with_owner,
        actions_without_owner,
        has_outcomes: !decisions.is_empty() || !items.is_empty(),
        productivity_score: decisions.len() * DECISION_WEIGHT
            + actions_with_owner * OWNED_ACTION_WEIGHT
            + actions_without_owner * UNOWNED_ACTION_WEIGHT,
        classification,
        avg_followup_hours: average_followup_hours(items),
    }
}

fn average_followup_hours(items: &[DbActionItem]) -> Option<f64> {
    let delays: Vec<f64> = items
        .iter()
        .filter_map(|item| {
            let acked = parse_ts(item.acknowledged_at.as_deref()?)?;
            let created = parse_ts(&item.created_at)?;
            Some((acked - created).num_seconds() as f64 / 3600.0)
        })
        .collect();
    if delays.is_empty() {
        return None;
    }
    let mean = delays.iter().sum::<f64>() / delays.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}
