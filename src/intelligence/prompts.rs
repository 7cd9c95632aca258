//! Extraction prompt and helpers for preparing input / salvaging output.

/// Maximum transcript content sent to the generator (covers ~75 min calls).
pub const TRANSCRIPT_MAX_CHARS: usize = 60_000;

/// Head portion kept for tail-biased truncation (attendees, meeting opening).
const TRANSCRIPT_HEAD_KEEP: usize = 3_000;

/// System prompt for decision / action item / risk extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an assistant that extracts structured information from meeting transcripts.

Return STRICT JSON with this schema:
{
  "decisions": [
    {
      "summary": "string",
      "owner": "string | null",
      "source_sentence": "string | null",
      "confidence": 0.0
    }
  ],
  "action_items": [
    {
      "description": "string",
      "owner": "string | null",
      "due_date": "YYYY-MM-DD | null",
      "source_sentence": "string | null",
      "confidence": 0.0
    }
  ],
  "risks": [
    {
      "description": "string",
      "source_sentence": "string | null",
      "confidence": 0.0
    }
  ]
}

Rules for confidence:
- confidence is between 0 and 1
- higher when the statement is clear, explicit, and committed
- lower when it's vague, tentative, or hypothetical

Rules for owner:
- Extract the person's name exactly as it appears in the transcript
- Use null if no clear owner is stated

Rules for source_sentence:
- Quote the transcript line the item came from, verbatim
"#;

/// Truncate transcript content with a tail-biased strategy.
///
/// Keeps the first 3K chars plus the tail, so the substantive end of a long
/// call survives. Slices only on UTF-8 boundaries.
pub fn truncate_transcript(content: &str) -> String {
    if content.len() <= TRANSCRIPT_MAX_CHARS {
        return content.to_string();
    }

    let mut head_end = TRANSCRIPT_HEAD_KEEP;
    while head_end > 0 && !content.is_char_boundary(head_end) {
        head_end -= 1;
    }

    // 30 bytes reserved for the splice marker
    let tail_len = TRANSCRIPT_MAX_CHARS - head_end - 30;
    let mut tail_start = content.len() - tail_len;
    while tail_start < content.len() && !content.is_char_boundary(tail_start) {
        tail_start += 1;
    }

    format!(
        "{}\n\n[... truncated {} chars ...]\n\n{}",
        &content[..head_end],
        tail_start - head_end,
        &content[tail_start..],
    )
}

/// Extract a JSON object from the response text.
/// Handles responses with markdown fences or surrounding prose.
pub fn extract_json_from_response(response: &str) -> Option<&str> {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return Some(response[json_start..json_start + end].trim());
        }
    }
    if let Some(start) = response.find("```") {
        let after_fence = start + 3;
        if let Some(nl) = response[after_fence..].find('\n') {
            let json_start = after_fence + nl + 1;
            if let Some(end) = response[json_start..].find("```") {
                let candidate = response[json_start..json_start + end].trim();
                if candidate.starts_with('{') {
                    return Some(candidate);
                }
            }
        }
    }

    let trimmed = response.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    // Balanced-brace scan for an object embedded in prose
    let start = response.find('{')?;
    let candidate = &response[start..];
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, ch) in candidate.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if ch == '\\' && in_string {
            escape = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if ch == '{' {
            depth += 1;
        } else if ch == '}' {
            depth -= 1;
            if depth == 0 {
                return Some(&candidate[..=i]);
            }
        }
    }
    None
}
