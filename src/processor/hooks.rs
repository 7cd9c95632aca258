//! Post-extraction hooks.
//!
//! Run after the extraction transaction commits: rebuild the meeting's rule
//! alerts, then append recurring-risk alerts. Both hooks share one
//! transaction, so the rebuild and the append commit together. Notifications
//! go out only after that commit.
//!
//! Each hook is error-isolated in its own savepoint: one failure doesn't
//! block others, and none of them can undo the committed extraction.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerts::{self, RoutedAlert};
use crate::config::AlertSettings;
use crate::db::{DbError, LedgerDb};
use crate::notification::Notifier;

/// Context passed to every post-extraction hook.
pub struct ExtractionContext<'a> {
    pub meeting_id: &'a str,
    pub now: DateTime<Utc>,
    pub settings: &'a AlertSettings,
}

/// Result from a single hook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResult {
    pub hook_name: &'static str,
    pub success: bool,
    pub alerts: usize,
    pub message: Option<String>,
}

type Hook = fn(&ExtractionContext<'_>, &LedgerDb) -> Result<Vec<RoutedAlert>, DbError>;

/// Registered hooks, in run order. Names double as savepoint names.
const HOOKS: &[(&str, Hook)] = &[
    ("rebuild_alerts", rebuild_alerts),
    ("detect_recurring_risks", detect_recurring_risks),
];

/// Run all post-extraction hooks in order.
pub fn run_post_extraction_hooks(
    ctx: &ExtractionContext<'_>,
    db: &LedgerDb,
    notifier: &dyn Notifier,
) -> Vec<HookResult> {
    let outcomes = db.with_transaction(|tx| {
        Ok::<_, DbError>(
            HOOKS
                .iter()
                .map(|&(name, hook)| (name, tx.with_savepoint(name, |sp| hook(ctx, sp))))
                .collect::<Vec<_>>(),
        )
    });

    match outcomes {
        Ok(outcomes) => outcomes
            .into_iter()
            .map(|(name, outcome)| finish(name, outcome, notifier))
            .collect(),
        Err(e) => {
            log::warn!("Post-extraction hooks rolled back: {}", e);
            HOOKS.iter().map(|&(name, _)| failed(name, &e)).collect()
        }
    }
}

fn rebuild_alerts(ctx: &ExtractionContext<'_>, tx: &LedgerDb) -> Result<Vec<RoutedAlert>, DbError> {
    alerts::engine::rebuild_rule_alerts(tx, ctx.meeting_id, ctx.now, ctx.settings)
}

fn detect_recurring_risks(
    ctx: &ExtractionContext<'_>,
    tx: &LedgerDb,
) -> Result<Vec<RoutedAlert>, DbError> {
    alerts::recurrence::append_recurring_alerts(tx, ctx.meeting_id, ctx.now, ctx.settings)
}

fn finish(
    hook_name: &'static str,
    outcome: Result<Vec<RoutedAlert>, DbError>,
    notifier: &dyn Notifier,
) -> HookResult {
    match outcome {
        Ok(routed) => {
            let delivered = alerts::dispatch(notifier, &routed);
            HookResult {
                hook_name,
                success: true,
                alerts: routed.len(),
                message: Some(format!(
                    "{} alerts ({} notified)",
                    routed.len(),
                    delivered
                )),
            }
        }
        Err(e) => failed(hook_name, &e),
    }
}

fn failed(hook_name: &'static str, error: &DbError) -> HookResult {
    log::warn!("Hook {}: {}", hook_name, error);
    HookResult {
        hook_name,
        success: false,
        alerts: 0,
        message: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::notification::test_utils::RecordingNotifier;

    #[test]
    fn test_hooks_run_in_order_and_notify() {
        let db = test_db();
        let meeting = db.insert_meeting("Empty", None).expect("meeting");
        let settings = AlertSettings::default();
        let ctx = ExtractionContext {
            meeting_id: &meeting.id,
            now: Utc::now(),
            settings: &settings,
        };
        let recorder = RecordingNotifier::default();

        let results = run_post_extraction_hooks(&ctx, &db, &recorder);
        let names: Vec<&str> = results.iter().map(|r| r.hook_name).collect();
        assert_eq!(names, vec!["rebuild_alerts", "detect_recurring_risks"]);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].alerts, 1);
        assert_eq!(recorder.sent.borrow().len(), 1);
    }

    #[test]
    fn test_notifier_failure_does_not_fail_hook() {
        let db = test_db();
        let meeting = db.insert_meeting("Empty", None).expect("meeting");
        let settings = AlertSettings::default();
        let ctx = ExtractionContext {
            meeting_id: &meeting.id,
            now: Utc::now(),
            settings: &settings,
        };
        let recorder = RecordingNotifier::failing();

        let results = run_post_extraction_hooks(&ctx, &db, &recorder);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].message.as_deref(), Some("1 alerts (0 notified)"));
        assert_eq!(db.get_meeting_alerts(&meeting.id).expect("alerts").len(), 1);
    }

    #[test]
    fn test_failing_hook_does_not_stop_the_next() {
        let db = test_db();
        let settings = AlertSettings::default();
        let ctx = ExtractionContext {
            meeting_id: "missing",
            now: Utc::now(),
            settings: &settings,
        };
        let recorder = RecordingNotifier::default();

        let results = run_post_extraction_hooks(&ctx, &db, &recorder);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(recorder.sent.borrow().is_empty());
    }
}
