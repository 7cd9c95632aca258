//! Meeting-scoped transcript processing.
//!
//! Extracts decisions, action items and risks from a transcript and replaces
//! whatever an earlier run stored for the same meeting:
//!
//! 1. Claim the meeting
//! 2. Generate structured output (before anything is deleted)
//! 3. Normalize it
//! 4. Delete and re-insert outcomes in one transaction
//! 5. Run post-extraction hooks (alerts, recurrence)
//!
//! Re-extraction is a destructive rebuild: status and acknowledgement set on
//! the previous run's action items are lost.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::hooks::{run_post_extraction_hooks, ExtractionContext, HookResult};
use super::normalize::{normalize, Extraction};
use crate::claims::MeetingClaims;
use crate::config::AlertSettings;
use crate::db::{DbError, DbTranscript, LedgerDb, NewActionItem};
use crate::error::ProcessError;
use crate::identity::resolve_owner;
use crate::intelligence::{
    truncate_transcript, GenerationError, TextGenerator, EXTRACTION_SYSTEM_PROMPT,
};
use crate::notification::Notifier;

/// Outcome of one processing run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub meeting_id: String,
    pub decisions: usize,
    pub action_items: usize,
    pub risks: usize,
    /// Entries dropped for failing required-field checks.
    pub rejected: usize,
    /// True when generation failed and an empty result was used instead.
    pub degraded: bool,
    pub alerts: usize,
    pub hooks: Vec<HookResult>,
}

#[derive(Debug, Default)]
struct Persisted {
    decisions: usize,
    action_items: usize,
    risks: usize,
}

pub struct TranscriptProcessor<'a> {
    db: &'a LedgerDb,
    generator: &'a dyn TextGenerator,
    notifier: &'a dyn Notifier,
    claims: &'a MeetingClaims,
    settings: AlertSettings,
}

impl<'a> TranscriptProcessor<'a> {
    pub fn new(
        db: &'a LedgerDb,
        generator: &'a dyn TextGenerator,
        notifier: &'a dyn Notifier,
        claims: &'a MeetingClaims,
    ) -> Self {
        Self {
            db,
            generator,
            notifier,
            claims,
            settings: AlertSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AlertSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn process_by_id(&self, transcript_id: &str) -> Result<ProcessSummary, ProcessError> {
        let transcript = self
            .db
            .get_transcript(transcript_id)?
            .ok_or_else(|| ProcessError::TranscriptNotFound(transcript_id.to_string()))?;
        self.process(&transcript)
    }

    pub fn process(&self, transcript: &DbTranscript) -> Result<ProcessSummary, ProcessError> {
        self.process_at(transcript, Utc::now())
    }

    /// Process with an explicit clock for the time-dependent alert rules.
    pub fn process_at(
        &self,
        transcript: &DbTranscript,
        now: DateTime<Utc>,
    ) -> Result<ProcessSummary, ProcessError> {
        let meeting_id = transcript.meeting_id.as_str();
        let _claim = self.claims.claim(self.db, meeting_id)?;

        let meeting = self
            .db
            .get_meeting(meeting_id)?
            .ok_or_else(|| ProcessError::MeetingNotFound(meeting_id.to_string()))?;

        let (raw, degraded) = self.generate(&transcript.content, &meeting.title)?;
        let extraction = normalize(&raw);

        let persisted = self
            .db
            .with_transaction(|tx| persist_extraction(tx, meeting_id, &extraction))?;

        log::info!(
            "Extracted '{}': {} decisions, {} action items, {} risks ({} rejected{})",
            meeting.title,
            persisted.decisions,
            persisted.action_items,
            persisted.risks,
            extraction.rejected.len(),
            if degraded { ", degraded" } else { "" }
        );

        let ctx = ExtractionContext {
            meeting_id,
            now,
            settings: &self.settings,
        };
        let hooks = run_post_extraction_hooks(&ctx, self.db, self.notifier);

        Ok(ProcessSummary {
            meeting_id: meeting_id.to_string(),
            decisions: persisted.decisions,
            action_items: persisted.action_items,
            risks: persisted.risks,
            rejected: extraction.rejected.len(),
            degraded,
            alerts: hooks.iter().map(|h| h.alerts).sum(),
            hooks,
        })
    }

    /// Returns the raw payload and whether it is a degraded stand-in.
    fn generate(&self, content: &str, title: &str) -> Result<(Value, bool), ProcessError> {
        if content.trim().is_empty() {
            log::info!("Transcript for '{}' is empty, skipping generation", title);
            return Ok((Value::Object(Default::default()), false));
        }

        match self
            .generator
            .generate(EXTRACTION_SYSTEM_PROMPT, &truncate_transcript(content))
        {
            Ok(value) if value.is_object() => Ok((value, false)),
            Ok(value) => {
                log::warn!(
                    "Generation for '{}' returned a non-object payload ({}), using empty result",
                    title,
                    json_kind(&value)
                );
                Ok((Value::Object(Default::default()), true))
            }
            Err(GenerationError::Unavailable(reason)) => Err(ProcessError::Unavailable(reason)),
            Err(e) => {
                log::warn!(
                    "Generation failed for '{}' (retryable: {}): {}, using empty result",
                    title,
                    e.is_retryable(),
                    e
                );
                Ok((Value::Object(Default::default()), true))
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Replace the meeting's outcomes. Runs inside the caller's transaction.
fn persist_extraction(
    tx: &LedgerDb,
    meeting_id: &str,
    extraction: &Extraction,
) -> Result<Persisted, DbError> {
    let removed = tx.clear_meeting_outcomes(meeting_id)?;
    if removed > 0 {
        log::debug!("Cleared {} prior outcomes for meeting {}", removed, meeting_id);
    }

    let mut persisted = Persisted::default();

    for decision in &extraction.decisions {
        let owner_id = resolve_owner(tx, decision.owner())?;
        tx.insert_decision(
            meeting_id,
            decision.text(),
            owner_id.as_deref(),
            decision.source_sentence(),
            decision.confidence(),
        )?;
        persisted.decisions += 1;
    }

    for item in &extraction.action_items {
        let owner_id = resolve_owner(tx, item.owner.as_deref())?;
        tx.insert_action_item(&NewActionItem {
            meeting_id,
            description: &item.description,
            owner_id: owner_id.as_deref(),
            due_date: item.due_date,
            source_sentence: item.source_sentence.as_deref(),
            confidence: item.confidence,
            created_at: None,
        })?;
        persisted.action_items += 1;
    }

    for risk in &extraction.risks {
        tx.insert_risk(meeting_id, risk.text(), risk.source_sentence(), risk.confidence())?;
        persisted.risks += 1;
    }

    tx.mark_meeting_extracted(meeting_id)?;
    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::{ActionStatus, AlertKind};
    use crate::intelligence::test_utils::{FakeGenerator, Script};
    use crate::notification::test_utils::RecordingNotifier;
    use chrono::TimeZone;
    use serde_json::json;

    const ALICE_BOB: &str = "Alice: We'll launch v2 in January.\n\
                             Bob: I'll prepare the launch checklist by January 10.";

    fn alice_bob_payload() -> Value {
        json!({
            "decisions": [{
                "summary": "Launch v2 in January",
                "owner": "Alice",
                "source_sentence": "Alice: We'll launch v2 in January.",
                "confidence": 0.9
            }],
            "action_items": [{
                "description": "Prepare launch checklist",
                "owner": "Bob",
                "due_date": "2025-01-10",
                "source_sentence": "Bob: I'll prepare the launch checklist by January 10.",
                "confidence": 0.85
            }],
            "risks": []
        })
    }

    fn before_due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap()
    }

    fn seeded(db: &LedgerDb, content: &str) -> DbTranscript {
        let owner = db.create_user("Olivia", "olivia@corp.io").expect("owner");
        let meeting = db.insert_meeting("Launch sync", Some(&owner.id)).expect("meeting");
        db.upsert_transcript(&meeting.id, content).expect("transcript")
    }

    fn alert_kinds(db: &LedgerDb, meeting_id: &str) -> Vec<AlertKind> {
        db.get_meeting_alerts(meeting_id)
            .expect("alerts")
            .into_iter()
            .map(|a| a.kind)
            .collect()
    }

    #[test]
    fn test_alice_bob_scenario() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let generator = FakeGenerator::replying(alice_bob_payload());
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();
        let processor = TranscriptProcessor::new(&db, &generator, &notifier, &claims);

        let summary = processor.process_at(&transcript, before_due()).expect("process");
        assert_eq!(summary.decisions, 1);
        assert_eq!(summary.action_items, 1);
        assert!(!summary.degraded);
        assert_eq!(summary.alerts, 0);

        let decisions = db.get_meeting_decisions(&transcript.meeting_id).expect("decisions");
        let alice = db.get_user_by_name("Alice").expect("lookup").expect("alice");
        assert_eq!(decisions[0].owner_id.as_deref(), Some(alice.id.as_str()));
        assert_eq!(alice.email, "alice@example.com");

        let items = db.get_meeting_action_items(&transcript.meeting_id).expect("items");
        let bob = db.get_user_by_name("Bob").expect("lookup").expect("bob");
        assert_eq!(items[0].owner_id.as_deref(), Some(bob.id.as_str()));
        assert_eq!(items[0].status, ActionStatus::Open);
        assert!(items[0].due_date.as_deref().unwrap_or_default().starts_with("2025-01-10"));

        assert!(alert_kinds(&db, &transcript.meeting_id).is_empty());
        assert!(notifier.sent.borrow().is_empty());

        let meeting = db.get_meeting(&transcript.meeting_id).expect("get").expect("meeting");
        assert!(meeting.extracted_at.is_some());
    }

    #[test]
    fn test_empty_payload_yields_single_no_outcomes() {
        let db = test_db();
        let transcript = seeded(&db, "Just chatting.");
        let generator = FakeGenerator::replying(json!({}));
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();
        let processor = TranscriptProcessor::new(&db, &generator, &notifier, &claims);

        let summary = processor.process_at(&transcript, before_due()).expect("process");
        assert_eq!(summary.decisions + summary.action_items + summary.risks, 0);
        assert_eq!(alert_kinds(&db, &transcript.meeting_id), vec![AlertKind::NoOutcomes]);

        let sent = notifier.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_email.as_deref(), Some("olivia@corp.io"));
    }

    #[test]
    fn test_rerun_is_idempotent_by_content() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let mut payload = alice_bob_payload();
        payload["action_items"]
            .as_array_mut()
            .expect("array")
            .push(json!({ "description": "Book demo room" }));
        let generator = FakeGenerator::replying(payload);
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();
        let processor = TranscriptProcessor::new(&db, &generator, &notifier, &claims);

        let snapshot = |db: &LedgerDb| {
            let mut items: Vec<(String, Option<String>)> = db
                .get_meeting_action_items(&transcript.meeting_id)
                .expect("items")
                .into_iter()
                .map(|i| (i.description, i.owner_id))
                .collect();
            items.sort();
            let mut alerts: Vec<(AlertKind, String)> = db
                .get_meeting_alerts(&transcript.meeting_id)
                .expect("alerts")
                .into_iter()
                .map(|a| (a.kind, a.message))
                .collect();
            alerts.sort_by(|a, b| a.1.cmp(&b.1));
            (items, alerts)
        };

        processor.process_at(&transcript, before_due()).expect("first");
        let first = snapshot(&db);
        processor.process_at(&transcript, before_due()).expect("second");
        let second = snapshot(&db);

        assert_eq!(first, second);
        assert_eq!(first.1.len(), 1, "one no_owner alert for the unowned item");
        assert_eq!(generator.calls.get(), 2);
    }

    #[test]
    fn test_rerun_replaces_done_item_with_open_one() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let generator = FakeGenerator::replying(alice_bob_payload());
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();
        let processor = TranscriptProcessor::new(&db, &generator, &notifier, &claims);

        processor.process_at(&transcript, before_due()).expect("first");
        let old = db.get_meeting_action_items(&transcript.meeting_id).expect("items");
        db.mark_action_item_done(&old[0].id).expect("done");

        processor.process_at(&transcript, before_due()).expect("second");
        let fresh = db.get_meeting_action_items(&transcript.meeting_id).expect("items");
        assert_eq!(fresh.len(), 1);
        assert_ne!(fresh[0].id, old[0].id);
        assert_eq!(fresh[0].status, ActionStatus::Open);
        assert!(db.get_action_item(&old[0].id).expect("get").is_none());
    }

    #[test]
    fn test_unavailable_generator_leaves_prior_run_intact() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();

        let good = FakeGenerator::replying(alice_bob_payload());
        TranscriptProcessor::new(&db, &good, &notifier, &claims)
            .process_at(&transcript, before_due())
            .expect("first");

        let unavailable = FakeGenerator::new(Script::Unavailable);
        let err = TranscriptProcessor::new(&db, &unavailable, &notifier, &claims)
            .process_at(&transcript, before_due())
            .expect_err("unavailable");
        assert!(matches!(err, ProcessError::Unavailable(_)));
        assert!(err.requires_user_action());

        assert_eq!(db.get_meeting_decisions(&transcript.meeting_id).expect("d").len(), 1);
        assert_eq!(db.get_meeting_action_items(&transcript.meeting_id).expect("a").len(), 1);
    }

    #[test]
    fn test_generation_failure_degrades_to_empty() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let generator = FakeGenerator::new(Script::ServerError);
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();
        let processor = TranscriptProcessor::new(&db, &generator, &notifier, &claims);

        let summary = processor.process_at(&transcript, before_due()).expect("process");
        assert!(summary.degraded);
        assert_eq!(summary.decisions + summary.action_items + summary.risks, 0);
        assert_eq!(alert_kinds(&db, &transcript.meeting_id), vec![AlertKind::NoOutcomes]);
    }

    #[test]
    fn test_notifier_failure_keeps_alerts() {
        let db = test_db();
        let transcript = seeded(&db, "Just chatting.");
        let generator = FakeGenerator::replying(json!({}));
        let notifier = RecordingNotifier::failing();
        let claims = MeetingClaims::new();

        let summary = TranscriptProcessor::new(&db, &generator, &notifier, &claims)
            .process_at(&transcript, before_due())
            .expect("process");

        assert_eq!(alert_kinds(&db, &transcript.meeting_id), vec![AlertKind::NoOutcomes]);
        assert_eq!(summary.alerts, 1);
        assert_eq!(notifier.sent.borrow().len(), 1, "delivery was attempted");

        let rebuild = summary
            .hooks
            .iter()
            .find(|h| h.hook_name == "rebuild_alerts")
            .expect("hook");
        assert!(rebuild.success);
        assert_eq!(rebuild.message.as_deref(), Some("1 alerts (0 notified)"));
        assert!(summary.hooks.iter().all(|h| h.success));
    }

    #[test]
    fn test_claim_released_after_run() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let generator = FakeGenerator::replying(alice_bob_payload());
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();

        TranscriptProcessor::new(&db, &generator, &notifier, &claims)
            .process_at(&transcript, before_due())
            .expect("process");
        assert!(db
            .get_meeting_claim(&transcript.meeting_id)
            .expect("get")
            .is_none());
    }

    #[test]
    fn test_non_object_payload_degrades() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let generator = FakeGenerator::replying(json!(["not", "an", "object"]));
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();

        let summary = TranscriptProcessor::new(&db, &generator, &notifier, &claims)
            .process_at(&transcript, before_due())
            .expect("process");
        assert!(summary.degraded);
    }

    #[test]
    fn test_missing_description_is_skipped_and_counted() {
        let db = test_db();
        let transcript = seeded(&db, ALICE_BOB);
        let generator = FakeGenerator::replying(json!({
            "action_items": [{ "owner": "Bob" }, { "description": "Send notes", "owner": "Bob" }]
        }));
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();

        let summary = TranscriptProcessor::new(&db, &generator, &notifier, &claims)
            .process_at(&transcript, before_due())
            .expect("process");
        assert_eq!(summary.action_items, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn test_empty_transcript_skips_generation() {
        let db = test_db();
        let transcript = seeded(&db, "   \n");
        let generator = FakeGenerator::replying(alice_bob_payload());
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();

        let summary = TranscriptProcessor::new(&db, &generator, &notifier, &claims)
            .process_at(&transcript, before_due())
            .expect("process");
        assert_eq!(generator.calls.get(), 0);
        assert!(!summary.degraded);
        assert_eq!(summary.alerts, 1);
    }

    #[test]
    fn test_process_by_id_unknown_transcript() {
        let db = test_db();
        let generator = FakeGenerator::replying(json!({}));
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();

        let err = TranscriptProcessor::new(&db, &generator, &notifier, &claims)
            .process_by_id("nope")
            .expect_err("missing");
        assert!(matches!(err, ProcessError::TranscriptNotFound(_)));
    }

    #[test]
    fn test_recurring_risk_flagged_after_rule_alerts() {
        let db = test_db();
        let owner = db.create_user("Olivia", "olivia@corp.io").expect("owner");
        let notifier = RecordingNotifier::default();
        let claims = MeetingClaims::new();
        let generator = FakeGenerator::replying(json!({
            "decisions": [{ "summary": "Keep going", "owner": "Olivia" }],
            "risks": ["vendor API delay blocks launch"]
        }));
        let processor = TranscriptProcessor::new(&db, &generator, &notifier, &claims);

        let mut last = None;
        for title in ["Week 1", "Week 2", "Week 3"] {
            let meeting = db.insert_meeting(title, Some(&owner.id)).expect("meeting");
            let transcript = db
                .upsert_transcript(&meeting.id, "Olivia: the vendor is late again.")
                .expect("transcript");
            last = Some(processor.process(&transcript).expect("process"));
        }

        let last = last.expect("ran");
        assert_eq!(alert_kinds(&db, &last.meeting_id), vec![AlertKind::RepeatedIssue]);
        let recurrence = last
            .hooks
            .iter()
            .find(|h| h.hook_name == "detect_recurring_risks")
            .expect("hook");
        assert_eq!(recurrence.alerts, 1);
    }
}
