//! Coerces raw generator output into canonical extraction records.
//!
//! The generator's JSON is loosely typed. Entries are decoded once here and
//! nothing downstream looks at `serde_json::Value` again.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// A decision or risk as the generator described it.
#[derive(Debug, Clone, PartialEq)]
pub enum TextEntry {
    /// The generator returned a bare string.
    TextOnly(String),
    Detailed {
        text: String,
        owner: Option<String>,
        source_sentence: Option<String>,
        confidence: Option<f64>,
    },
}

impl TextEntry {
    pub fn text(&self) -> &str {
        match self {
            TextEntry::TextOnly(text) | TextEntry::Detailed { text, .. } => text,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            TextEntry::TextOnly(_) => None,
            TextEntry::Detailed { owner, .. } => owner.as_deref(),
        }
    }

    pub fn source_sentence(&self) -> Option<&str> {
        match self {
            TextEntry::TextOnly(_) => None,
            TextEntry::Detailed {
                source_sentence, ..
            } => source_sentence.as_deref(),
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            TextEntry::TextOnly(_) => None,
            TextEntry::Detailed { confidence, .. } => *confidence,
        }
    }
}

/// An action item that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCandidate {
    pub description: String,
    pub owner: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub source_sentence: Option<String>,
    pub confidence: Option<f64>,
}

/// Why a single entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("{section}[{index}] has unsupported shape")]
    UnsupportedShape { section: &'static str, index: usize },

    #[error("{section}[{index}] is missing required field '{field}'")]
    MissingField {
        section: &'static str,
        index: usize,
        field: &'static str,
    },
}

/// Canonical result of one extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub decisions: Vec<TextEntry>,
    pub action_items: Vec<ActionCandidate>,
    pub risks: Vec<TextEntry>,
    pub rejected: Vec<EntryError>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty() && self.action_items.is_empty() && self.risks.is_empty()
    }
}

/// Normalize the generator's JSON. Never fails; bad entries land in `rejected`.
pub fn normalize(raw: &Value) -> Extraction {
    let mut extraction = Extraction::default();

    for (index, entry) in section(raw, "decisions").iter().enumerate() {
        match text_entry(entry, &["summary", "text"]) {
            Some(decision) => extraction.decisions.push(decision),
            None => extraction.rejected.push(EntryError::UnsupportedShape {
                section: "decisions",
                index,
            }),
        }
    }

    for (index, entry) in section(raw, "action_items").iter().enumerate() {
        match action_candidate(entry, index) {
            Ok(item) => extraction.action_items.push(item),
            Err(e) => extraction.rejected.push(e),
        }
    }

    for (index, entry) in section(raw, "risks").iter().enumerate() {
        match text_entry(entry, &["description"]) {
            Some(risk) => extraction.risks.push(risk),
            None => extraction.rejected.push(EntryError::UnsupportedShape {
                section: "risks",
                index,
            }),
        }
    }

    for rejected in &extraction.rejected {
        log::warn!("Skipping extracted entry: {}", rejected);
    }

    extraction
}

fn section<'a>(raw: &'a Value, key: &str) -> &'a [Value] {
    match raw.get(key) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn text_entry(entry: &Value, text_keys: &[&str]) -> Option<TextEntry> {
    match entry {
        Value::String(text) => Some(TextEntry::TextOnly(text.clone())),
        Value::Object(_) => {
            let text = text_keys
                .iter()
                .find_map(|key| string_field(entry, key))
                .unwrap_or_default();
            Some(TextEntry::Detailed {
                text,
                owner: owner_field(entry),
                source_sentence: string_field(entry, "source_sentence"),
                confidence: entry.get("confidence").and_then(Value::as_f64),
            })
        }
        _ => None,
    }
}

fn action_candidate(entry: &Value, index: usize) -> Result<ActionCandidate, EntryError> {
    if !entry.is_object() {
        return Err(EntryError::UnsupportedShape {
            section: "action_items",
            index,
        });
    }

    let description = string_field(entry, "description")
        .filter(|d| !d.trim().is_empty())
        .ok_or(EntryError::MissingField {
            section: "action_items",
            index,
            field: "description",
        })?;

    Ok(ActionCandidate {
        description,
        owner: owner_field(entry),
        due_date: entry
            .get("due_date")
            .and_then(Value::as_str)
            .and_then(parse_due_date),
        source_sentence: string_field(entry, "source_sentence"),
        confidence: entry.get("confidence").and_then(Value::as_f64),
    })
}

fn string_field(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(String::from)
}

/// Owner names are kept verbatim; only blank ones are dropped.
fn owner_field(entry: &Value) -> Option<String> {
    string_field(entry, "owner").filter(|o| !o.trim().is_empty())
}

/// Parse a due date. Naive values are read as UTC, date-only as midnight.
pub fn parse_due_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_full_payload() {
        let raw = json!({
            "decisions": [{
                "summary": "Launch v2 in January",
                "owner": "Alice",
                "source_sentence": "Alice: We'll launch v2 in January.",
                "confidence": 0.92
            }],
            "action_items": [{
                "description": "Prepare launch checklist",
                "owner": "Bob",
                "due_date": "2025-01-10",
                "confidence": 0.8
            }],
            "risks": ["Vendor API may slip"]
        });

        let extraction = normalize(&raw);
        assert_eq!(extraction.decisions.len(), 1);
        assert_eq!(extraction.decisions[0].text(), "Launch v2 in January");
        assert_eq!(extraction.decisions[0].owner(), Some("Alice"));
        assert_eq!(extraction.decisions[0].confidence(), Some(0.92));

        let item = &extraction.action_items[0];
        assert_eq!(item.owner.as_deref(), Some("Bob"));
        assert_eq!(
            item.due_date,
            Some(Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap())
        );

        assert_eq!(
            extraction.risks,
            vec![TextEntry::TextOnly("Vendor API may slip".to_string())]
        );
        assert!(extraction.rejected.is_empty());
    }

    #[test]
    fn test_empty_and_non_object_roots() {
        assert!(normalize(&json!({})).is_empty());
        assert!(normalize(&json!([1, 2, 3])).is_empty());
        assert!(normalize(&json!("nothing")).is_empty());
        assert!(normalize(&json!({ "decisions": "not a list" })).is_empty());
    }

    #[test]
    fn test_decision_falls_back_to_text_key() {
        let extraction = normalize(&json!({ "decisions": [{ "text": "Use Postgres" }, {}] }));
        assert_eq!(extraction.decisions[0].text(), "Use Postgres");
        assert_eq!(extraction.decisions[1].text(), "");
    }

    #[test]
    fn test_action_without_description_is_rejected_individually() {
        let extraction = normalize(&json!({
            "action_items": [
                { "owner": "Bob" },
                { "description": "   " },
                "just a string",
                { "description": "Send notes" }
            ]
        }));
        assert_eq!(extraction.action_items.len(), 1);
        assert_eq!(extraction.action_items[0].description, "Send notes");
        assert_eq!(extraction.rejected.len(), 3);
        assert_eq!(
            extraction.rejected[0],
            EntryError::MissingField {
                section: "action_items",
                index: 0,
                field: "description"
            }
        );
    }

    #[test]
    fn test_malformed_fields_are_defaulted() {
        let extraction = normalize(&json!({
            "action_items": [{
                "description": "Fix build",
                "owner": 42,
                "due_date": "next tuesday",
                "confidence": "high"
            }],
            "risks": [{ "description": "Flaky CI", "confidence": 1.7 }, 17]
        }));
        let item = &extraction.action_items[0];
        assert_eq!(item.owner, None);
        assert_eq!(item.due_date, None);
        assert_eq!(item.confidence, None);

        assert_eq!(extraction.risks[0].confidence(), Some(1.7), "no clamping");
        assert_eq!(
            extraction.rejected,
            vec![EntryError::UnsupportedShape {
                section: "risks",
                index: 1
            }]
        );
    }

    #[test]
    fn test_owner_kept_verbatim_blank_dropped() {
        let extraction = normalize(&json!({
            "decisions": [{ "summary": "a", "owner": " Alice " }, { "summary": "b", "owner": "  " }]
        }));
        assert_eq!(extraction.decisions[0].owner(), Some(" Alice "));
        assert_eq!(extraction.decisions[1].owner(), None);
    }

    #[test]
    fn test_parse_due_date_formats() {
        let nine = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        assert_eq!(parse_due_date("2025-01-10T09:00:00"), Some(nine));
        assert_eq!(parse_due_date("2025-01-10 09:00:00"), Some(nine));
        assert_eq!(parse_due_date("2025-01-10T10:00:00+01:00"), Some(nine));
        assert_eq!(parse_due_date("2025-01-10T09:00:00Z"), Some(nine));
        assert_eq!(
            parse_due_date("2025-01-10"),
            Some(Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_due_date("10/01/2025"), None);
        assert_eq!(parse_due_date(""), None);
    }
}
