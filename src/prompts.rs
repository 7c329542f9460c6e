//! Prompts for VLM-based process-flow analysis.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing how the model is asked for
//!    the JSON shape (adding a field, tightening an instruction) requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real VLM, making prompt regressions easy to catch.
//!
//! Callers can override the system prompt via
//! [`crate::config::SopConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Default system prompt for the diagram-analysis request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert at analyzing process flow \
diagrams and converting them into detailed text descriptions.";

/// Instruction block sent alongside the diagram image.
///
/// Demands one JSON object in a fixed shape. Recovery (`crate::recovery`)
/// still treats the response as untrusted prose — models follow this
/// *usually*, not always.
pub const ANALYSIS_INSTRUCTIONS: &str = r#"Analyze this process flow diagram.
Describe the steps in detail, following the Output Format when one is given.
Generate an Objective and also the Purpose for the process flow in 3-4 sentences.
Order the steps exactly as the process flow image shows them.
Consider all possible flows; if there are multiple options after a step, create a and b variants for those steps.
Consider every box in the image as a Step and create sub-steps for each step.
In the details, add as many sub-steps as possible for each activity.
Do not treat any reference material as input — it only illustrates the expected output shape.
Do not copy reference text into the output.
IMPORTANT: Provide the response in valid JSON format with the following structure:
{
  "title": "...",
  "Objective": "...",
  "purpose": "...",
  "steps": [
    {
      "step": "...",
      "role": "...",
      "activities": [
        {
          "task": "...",
          "details": [
            "...",
            "..."
          ]
        }
      ]
    }
  ]
}"#;

/// Caption preceding an attached reference diagram.
pub const REFERENCE_IMAGE_CAPTION: &str =
    "Additional Context: Here is a reference image for additional context:";

/// Wrap a reference output sample for the request.
pub fn reference_format_context(sample: &str) -> String {
    format!("Output Format:\n{sample}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_demand_the_wire_shape() {
        for key in ["\"title\"", "\"Objective\"", "\"purpose\"", "\"steps\"", "\"activities\"", "\"details\""] {
            assert!(
                ANALYSIS_INSTRUCTIONS.contains(key),
                "instruction block must mention {key}"
            );
        }
    }

    #[test]
    fn reference_format_context_embeds_sample() {
        let ctx = reference_format_context("{\"title\": \"example\"}");
        assert!(ctx.starts_with("Output Format:\n"));
        assert!(ctx.contains("example"));
    }
}
