//! Due-date reminders for open, owned action items.
//!
//! Read-only: reminders are computed on demand and sent, nothing is stored.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::AlertSettings;
use crate::db::{DbActionItem, DbError, LedgerDb};
use crate::notification::{send_or_log, Notification, Notifier};
use crate::util::parse_ts;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub item: DbActionItem,
    pub meeting_title: String,
    pub recipient_email: Option<String>,
    /// Calendar days from today to the due date. Negative when overdue.
    pub days_until_due: i64,
}

impl Reminder {
    pub fn message(&self) -> String {
        let due = match self.days_until_due {
            d if d < 0 => format!("was due {} days ago", -d),
            0 => "is due today".to_string(),
            1 => "is due tomorrow".to_string(),
            d => format!("is due in {} days", d),
        };
        format!(
            "Action item '{}' from '{}' {}.",
            self.item.description, self.meeting_title, due
        )
    }
}

/// Open, owned items due within the horizon, overdue ones included.
///
/// The horizon counts calendar days in UTC, so an item due late tomorrow is
/// in range with the default one-day horizon.
pub fn collect_due_reminders(
    db: &LedgerDb,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Result<Vec<Reminder>, DbError> {
    let today = now.date_naive();
    let horizon = settings.reminder_horizon();
    let fetch_until = now + Duration::days(horizon + 1);

    let mut reminders = Vec::new();
    for item in db.get_due_reminders(fetch_until)? {
        let due = match item.due_date.as_deref().and_then(parse_ts) {
            Some(d) => d,
            None => continue,
        };
        let days_until_due = (due.date_naive() - today).num_days();
        if days_until_due > horizon {
            continue;
        }

        let meeting_title = match db.get_meeting(&item.meeting_id)? {
            Some(m) => m.title,
            None => continue,
        };
        let recipient_email = db.user_email(item.owner_id.as_deref())?;
        if recipient_email.is_none() {
            continue;
        }

        reminders.push(Reminder {
            item,
            meeting_title,
            recipient_email,
            days_until_due,
        });
    }
    Ok(reminders)
}

/// Send every due reminder. Returns how many were delivered.
pub fn send_due_reminders(
    db: &LedgerDb,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
    settings: &AlertSettings,
) -> Result<usize, DbError> {
    let reminders = collect_due_reminders(db, now, settings)?;
    let sent = reminders
        .iter()
        .filter(|r| {
            send_or_log(
                notifier,
                &Notification {
                    subject: "Action Item Reminder".to_string(),
                    body: r.message(),
                    recipient_email: r.recipient_email.clone(),
                },
            )
        })
        .count();
    log::info!("Sent {} of {} due-date reminders", sent, reminders.len());
    Ok(sent)
}
