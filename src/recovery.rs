//! Structured-response recovery: pull a JSON analysis out of free-form
//! model text.
//!
//! ## Why is recovery necessary?
//!
//! The vision model is instructed to answer with a bare JSON object, but
//! real responses wander: a sentence of preamble, the object wrapped in a
//! ` ```json ` fence, a trailing "let me know if…". Recovery applies an
//! ordered fallback chain and stops at the first success:
//!
//! 1. Parse the whole trimmed response as JSON. Succeeds iff it is a
//!    JSON *object* — missing fields are fine (defaults are a render-time
//!    concern, not a parse-time one).
//! 2. On a syntax error, look for the literal markers ` ```json ` and a
//!    following ` ``` `; parse the substring strictly between the first
//!    opening marker and the next closing marker.
//! 3. Otherwise fail with [`UnitError::RecoveryFailed`].
//!
//! There is deliberately no third trick (no brace-balancing, no quote
//! repair): once top-level JSON parses, its content is taken as-is, and
//! when neither attempt works the response is unusable. Retrying the
//! same text is pointless — only re-invoking the model could help, and
//! that policy belongs to the caller.

use crate::error::UnitError;
use crate::record::AnalysisRecord;
use serde_json::Value;
use tracing::debug;

/// Opening marker of a fenced JSON block.
const FENCE_OPEN: &str = "```json";
/// Closing marker of a fenced block.
const FENCE_CLOSE: &str = "```";

/// Recover an [`AnalysisRecord`] from a raw model response.
///
/// # Errors
/// [`UnitError::RecoveryFailed`] when neither the whole input nor a
/// fenced substring parses to a JSON object. The failure is terminal for
/// this response — callers must not retry the same text.
pub fn recover(raw: &str) -> Result<AnalysisRecord, UnitError> {
    let trimmed = raw.trim();

    // Attempt 1: the whole response is the object.
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => {
            return AnalysisRecord::from_value(value).ok_or_else(|| UnitError::RecoveryFailed {
                detail: "response parsed as JSON but is not an object".into(),
            });
        }
        Err(e) => debug!("Whole-response JSON parse failed: {e}"),
    }

    // Attempt 2: the object is inside the first ```json … ``` fence.
    let fenced = extract_fenced(trimmed).ok_or_else(|| UnitError::RecoveryFailed {
        detail: "response is not JSON and contains no ```json fence".into(),
    })?;

    let value: Value = serde_json::from_str(fenced).map_err(|e| UnitError::RecoveryFailed {
        detail: format!("fenced block is not valid JSON: {e}"),
    })?;

    AnalysisRecord::from_value(value).ok_or_else(|| UnitError::RecoveryFailed {
        detail: "fenced block parsed as JSON but is not an object".into(),
    })
}

/// The substring strictly between the first `FENCE_OPEN` and the next
/// `FENCE_CLOSE` after it, trimmed. `None` unless both markers exist.
fn extract_fenced(text: &str) -> Option<&str> {
    let start = text.find(FENCE_OPEN)? + FENCE_OPEN.len();
    let rest = &text[start..];
    let end = rest.find(FENCE_CLOSE)?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Steps;

    const BARE: &str = r#"{"title":"Order Intake","Objective":"O","purpose":"P","steps":[]}"#;

    #[test]
    fn valid_json_parses_directly() {
        let record = recover(BARE).expect("bare JSON must recover");
        assert_eq!(record.title.as_deref(), Some("Order Intake"));
        assert_eq!(record.steps, Some(Steps::Structured(vec![])));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let record = recover(&format!("\n\n  {BARE}  \n")).expect("must recover");
        assert_eq!(record.objective.as_deref(), Some("O"));
    }

    #[test]
    fn fenced_json_with_prose_recovers() {
        let raw = format!("Here is the analysis you asked for:\n```json\n{BARE}\n```\nHope that helps!");
        let record = recover(&raw).expect("fenced JSON must recover");
        assert_eq!(record.purpose.as_deref(), Some("P"));
    }

    #[test]
    fn first_fence_wins() {
        let raw = format!(
            "```json\n{BARE}\n```\nand another:\n```json\n{{\"title\":\"second\"}}\n```"
        );
        let record = recover(&raw).expect("must recover the first fence");
        assert_eq!(record.title.as_deref(), Some("Order Intake"));
    }

    #[test]
    fn no_json_anywhere_fails() {
        let err = recover("The diagram shows a four-step approval flow.").unwrap_err();
        assert!(matches!(err, UnitError::RecoveryFailed { .. }));
    }

    #[test]
    fn open_fence_without_close_fails() {
        let err = recover(&format!("```json\n{BARE}")).unwrap_err();
        assert!(matches!(err, UnitError::RecoveryFailed { .. }));
    }

    #[test]
    fn garbage_inside_fence_fails() {
        let err = recover("```json\n{not json at all\n```").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fenced block"), "got: {msg}");
    }

    #[test]
    fn top_level_array_is_not_a_record() {
        let err = recover(r#"[{"title":"x"}]"#).unwrap_err();
        assert!(matches!(err, UnitError::RecoveryFailed { .. }));
    }

    #[test]
    fn fenced_array_is_not_a_record() {
        let err = recover("preamble\n```json\n[1,2]\n```").unwrap_err();
        assert!(matches!(err, UnitError::RecoveryFailed { .. }));
    }

    #[test]
    fn string_steps_survive_recovery() {
        let record =
            recover(r#"{"steps":"Receive, validate, archive."}"#).expect("must recover");
        assert_eq!(
            record.steps,
            Some(Steps::Text("Receive, validate, archive.".into()))
        );
    }

    #[test]
    fn fence_is_only_consulted_after_bare_parse_fails() {
        // The whole input is valid JSON whose `purpose` happens to contain
        // fence markers; attempt 1 must win and keep them literal.
        let raw = r#"{"purpose":"see ```json block``` below"}"#;
        let record = recover(raw).expect("must recover");
        assert_eq!(
            record.purpose.as_deref(),
            Some("see ```json block``` below")
        );
    }

    #[test]
    fn extract_fenced_trims_padding() {
        assert_eq!(extract_fenced("```json\n  {}  \n```"), Some("{}"));
        assert_eq!(extract_fenced("no fences here"), None);
    }
}
