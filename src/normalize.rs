//! Recovery of validated question records from untrusted model output.
//!
//! Models routinely wrap the requested JSON in prose, code fences, or both,
//! so whole-string parsing is a losing game. The normalizer first bounds the
//! top-level object with a string-aware brace scan, then parses only that
//! substring, then validates each element of the `questions` array
//! individually so one bad item cannot sink an otherwise usable response.

use crate::question::QuestionDraft;
use thiserror::Error;

const PREVIEW_HEAD: usize = 300;
const PREVIEW_TAIL: usize = 120;

/// Errors raised while normalizing raw model output.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// No well-formed top-level JSON object could be recovered.
    #[error("Malformed model response: {0}")]
    Malformed(String),
    /// The response parsed but no element survived schema validation.
    #[error("Model response contained no valid questions")]
    NoValidQuestions,
}

#[derive(Debug, serde::Deserialize)]
struct RawResponse {
    questions: Vec<serde_json::Value>,
}

/// Extract schema-valid question drafts from raw model text.
///
/// `job_id` is stamped onto every surviving draft. Elements failing the
/// per-type structural checks are dropped with a warning; an empty survivor
/// set is reported as [`NormalizeError::NoValidQuestions`].
pub fn normalize_response(raw: &str, job_id: &str) -> Result<Vec<QuestionDraft>, NormalizeError> {
    let stripped = strip_code_fences(raw.trim());
    let bounded = extract_object(stripped)?;

    let parsed: RawResponse = serde_json::from_str(bounded).map_err(|error| {
        NormalizeError::Malformed(format!(
            "JSON parse failed: {error} (length {} bytes, starts {:?}, ends {:?})",
            bounded.len(),
            head_preview(bounded),
            tail_preview(bounded)
        ))
    })?;

    let total = parsed.questions.len();
    let mut drafts = Vec::with_capacity(total);
    for (index, value) in parsed.questions.into_iter().enumerate() {
        match serde_json::from_value::<QuestionDraft>(value) {
            Ok(mut draft) => {
                draft.canonicalize();
                match draft.validate() {
                    Ok(()) => {
                        draft.source_job_id = job_id.to_string();
                        drafts.push(draft);
                    }
                    Err(error) => {
                        tracing::warn!(index, error = %error, "Dropping question failing schema validation");
                    }
                }
            }
            Err(error) => {
                tracing::warn!(index, error = %error, "Dropping undecodable question element");
            }
        }
    }

    if drafts.is_empty() {
        tracing::warn!(total, "No questions survived validation");
        return Err(NormalizeError::NoValidQuestions);
    }

    Ok(drafts)
}

/// Remove a leading code-fence marker (with or without a language tag) and a
/// trailing fence, when present.
fn strip_code_fences(text: &str) -> &str {
    let mut inner = text;
    if inner.starts_with("```") {
        inner = match inner.find('\n') {
            Some(newline) => &inner[newline + 1..],
            None => "",
        };
    }
    if let Some(stripped) = inner.trim_end().strip_suffix("```") {
        inner = stripped;
    }
    inner.trim()
}

/// Bound the first top-level JSON object in `text`.
///
/// Scans forward from the first `{` counting brace depth, ignoring braces
/// inside string literals and escape sequences. Everything before the object
/// and after its closing brace is discarded.
fn extract_object(text: &str) -> Result<&str, NormalizeError> {
    let start = text
        .find('{')
        .ok_or_else(|| NormalizeError::Malformed("no JSON object found in response".into()))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, character) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match character {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    Err(NormalizeError::Malformed(
        "unbalanced braces: top-level object never closes".into(),
    ))
}

fn head_preview(text: &str) -> &str {
    &text[..floor_char_boundary(text, PREVIEW_HEAD)]
}

fn tail_preview(text: &str) -> &str {
    let start = text.len().saturating_sub(PREVIEW_TAIL);
    &text[ceil_char_boundary(text, start)..]
}

fn floor_char_boundary(text: &str, at: usize) -> usize {
    let mut index = at.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, at: usize) -> usize {
    let mut index = at.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
