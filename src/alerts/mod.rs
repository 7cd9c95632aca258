//! Alert generation: the rule engine, recurring-risk detection, due-date
//! reminders and per-meeting metrics.

pub mod engine;
pub mod metrics;
pub mod recurrence;
pub mod reminders;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AlertSettings;
use crate::db::{DbAlert, DbError, LedgerDb};
use crate::notification::{notify_alert, Notifier};

pub use engine::evaluate;
pub use metrics::{meeting_metrics, MeetingClassification, MeetingMetrics};
pub use recurrence::detect;
pub use reminders::{collect_due_reminders, send_due_reminders, Reminder};

/// A persisted alert plus the address it should be delivered to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedAlert {
    pub alert: DbAlert,
    pub recipient_email: Option<String>,
}

/// Rebuild the rule alerts and append recurring-risk alerts in one
/// transaction. Nothing is sent; pass the result to [`dispatch`].
pub fn refresh(
    db: &LedgerDb,
    meeting_id: &str,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Result<Vec<RoutedAlert>, DbError> {
    db.with_transaction(|tx| {
        let mut routed = engine::rebuild_rule_alerts(tx, meeting_id, now, settings)?;
        routed.extend(recurrence::append_recurring_alerts(
            tx, meeting_id, now, settings,
        )?);
        Ok(routed)
    })
}

/// Notify every alert's recipient. Returns how many sends succeeded.
pub fn dispatch(notifier: &dyn Notifier, alerts: &[RoutedAlert]) -> usize {
    alerts
        .iter()
        .filter(|routed| notify_alert(notifier, &routed.alert, routed.recipient_email.as_deref()))
        .count()
}
