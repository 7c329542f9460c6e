//! The structured description of a process flow, as recovered from the
//! vision model's response.
//!
//! The model is *asked* for a fixed JSON shape but routinely bends it:
//! fields go missing, `steps` arrives as prose instead of an array, an
//! array slot holds a bare string, `activities` turns into a scalar.
//! Rather than rejecting those responses, every accessor here degrades to
//! a default — the record is built leniently from a [`serde_json::Value`]
//! and the template substitutes `"N/A"` for anything absent at render
//! time. Once the top-level JSON parses, its content is taken as-is:
//! malformed nesting inside a valid object is passed through, not
//! repaired.
//!
//! The record is immutable after construction: Recovery builds it once
//! per diagram, the Assembler only reads it, and it is dropped once the
//! document bytes exist.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel substituted for every missing textual field at render time.
pub const MISSING: &str = "N/A";

/// A validated description of one process-flow diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Document title. Absent ⇒ the cover block is omitted entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// What the process achieves, in a few sentences.
    ///
    /// Serialized as `Objective` — the capitalized key the model is
    /// prompted with and the reference corpus uses.
    #[serde(rename = "Objective", skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,

    /// Why the process exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// The procedure body: either free prose or an ordered step list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Steps>,
}

/// The two shapes `steps` arrives in.
///
/// Prose renders as a single paragraph; a structured list drives the
/// step/activity/detail hierarchy of the Detailed Process Steps section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Steps {
    /// Free-text description of the whole procedure.
    Text(String),
    /// Ordered sequence of steps; order is the execution order.
    Structured(Vec<StepRecord>),
}

/// One step of the procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step identifier or label ("1", "2a", …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Role or actor responsible for the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Units of work inside the step, in order. Missing or non-sequence
    /// input ⇒ empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<ActivityRecord>,
}

/// One unit of work inside a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Short description of the task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Sub-steps or bullets, in order. Missing or non-sequence input ⇒
    /// empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl AnalysisRecord {
    /// Build a record from a parsed JSON value.
    ///
    /// Returns `None` unless `value` is a JSON object — a top-level
    /// array, string, or number is not a usable analysis. Inside the
    /// object everything is optional and every shape mismatch degrades:
    /// a non-array `steps` that is a string becomes [`Steps::Text`],
    /// non-object entries in a steps array become default step records,
    /// non-string detail items keep their compact JSON text.
    pub fn from_value(value: Value) -> Option<Self> {
        let map = match value {
            Value::Object(map) => map,
            _ => return None,
        };

        // The prompt asks for `Objective`; some models normalize the key.
        let objective = map
            .get("Objective")
            .or_else(|| map.get("objective"))
            .and_then(text_of);

        Some(Self {
            title: map.get("title").and_then(text_of),
            objective,
            purpose: map.get("purpose").and_then(text_of),
            steps: map.get("steps").and_then(steps_of),
        })
    }
}

impl StepRecord {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                step: map.get("step").and_then(text_of),
                role: map.get("role").and_then(text_of),
                activities: match map.get("activities") {
                    Some(Value::Array(items)) => {
                        items.iter().map(ActivityRecord::from_value).collect()
                    }
                    // Scalar or missing `activities` means zero activities.
                    _ => Vec::new(),
                },
            },
            // A non-object entry in the steps array: every field defaults.
            _ => Self::default(),
        }
    }
}

impl ActivityRecord {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                task: map.get("task").and_then(text_of),
                details: match map.get("details") {
                    Some(Value::Array(items)) => items.iter().map(detail_text).collect(),
                    _ => Vec::new(),
                },
            },
            _ => Self::default(),
        }
    }
}

/// Extract a textual field: strings pass through, `null` is absent, any
/// other scalar keeps its JSON rendering.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A detail bullet: usually a string, otherwise its compact JSON text.
fn detail_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn steps_of(value: &Value) -> Option<Steps> {
    match value {
        Value::String(s) => Some(Steps::Text(s.clone())),
        Value::Array(items) => Some(Steps::Structured(
            items.iter().map(StepRecord::from_value).collect(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_record_round_trips() {
        let record = AnalysisRecord::from_value(json!({
            "title": "Order Intake",
            "Objective": "O",
            "purpose": "P",
            "steps": [{
                "step": "1",
                "role": "Clerk",
                "activities": [{
                    "task": "Receive order",
                    "details": ["Check ID", "Log entry"]
                }]
            }]
        }))
        .expect("object must produce a record");

        assert_eq!(record.title.as_deref(), Some("Order Intake"));
        assert_eq!(record.objective.as_deref(), Some("O"));
        assert_eq!(record.purpose.as_deref(), Some("P"));
        let steps = match record.steps {
            Some(Steps::Structured(ref s)) => s,
            ref other => panic!("expected structured steps, got {:?}", other),
        };
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].activities[0].details, vec!["Check ID", "Log entry"]);
    }

    #[test]
    fn non_object_top_level_is_rejected() {
        assert!(AnalysisRecord::from_value(json!([1, 2, 3])).is_none());
        assert!(AnalysisRecord::from_value(json!("just text")).is_none());
        assert!(AnalysisRecord::from_value(json!(42)).is_none());
    }

    #[test]
    fn missing_fields_default_to_none() {
        let record = AnalysisRecord::from_value(json!({})).unwrap();
        assert!(record.title.is_none());
        assert!(record.objective.is_none());
        assert!(record.purpose.is_none());
        assert!(record.steps.is_none());
    }

    #[test]
    fn lowercase_objective_key_is_accepted() {
        let record = AnalysisRecord::from_value(json!({"objective": "lower"})).unwrap();
        assert_eq!(record.objective.as_deref(), Some("lower"));
    }

    #[test]
    fn string_steps_become_text() {
        let record =
            AnalysisRecord::from_value(json!({"steps": "do the thing, then stop"})).unwrap();
        assert_eq!(
            record.steps,
            Some(Steps::Text("do the thing, then stop".into()))
        );
    }

    #[test]
    fn non_object_step_entries_default_instead_of_failing() {
        let record = AnalysisRecord::from_value(json!({
            "steps": ["just a string", {"step": "2", "role": "Agent"}]
        }))
        .unwrap();
        let steps = match record.steps {
            Some(Steps::Structured(s)) => s,
            other => panic!("expected structured steps, got {:?}", other),
        };
        assert_eq!(steps.len(), 2);
        assert!(steps[0].step.is_none());
        assert!(steps[0].activities.is_empty());
        assert_eq!(steps[1].step.as_deref(), Some("2"));
    }

    #[test]
    fn scalar_activities_means_zero_activities() {
        let record = AnalysisRecord::from_value(json!({
            "steps": [{"step": "1", "role": "Clerk", "activities": "not a list"}]
        }))
        .unwrap();
        let steps = match record.steps {
            Some(Steps::Structured(s)) => s,
            other => panic!("expected structured steps, got {:?}", other),
        };
        assert!(steps[0].activities.is_empty());
    }

    #[test]
    fn non_string_details_keep_their_json_text() {
        let record = AnalysisRecord::from_value(json!({
            "steps": [{"activities": [{"task": "t", "details": ["ok", 7, {"k": "v"}]}]}]
        }))
        .unwrap();
        let steps = match record.steps {
            Some(Steps::Structured(s)) => s,
            other => panic!("expected structured steps, got {:?}", other),
        };
        assert_eq!(
            steps[0].activities[0].details,
            vec!["ok", "7", r#"{"k":"v"}"#]
        );
    }

    #[test]
    fn serializes_with_capitalized_objective_key() {
        let record = AnalysisRecord {
            objective: Some("O".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""Objective":"O""#), "got: {json}");
    }
}
