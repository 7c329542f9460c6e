//! VLM interaction: build the diagram-analysis request and call the
//! provider.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] so it can be changed without touching retry or
//! error-handling logic here, and all response parsing lives in
//! [`crate::recovery`] so this module never inspects what the model said.
//!
//! ## The collaborator seam
//!
//! The orchestrators depend on the [`FlowAnalyzer`] trait, not on a
//! concrete provider. The production implementation
//! ([`VlmFlowAnalyzer`]) wraps an `edgequake-llm` provider; tests inject
//! a stub via [`crate::config::SopConfigBuilder::analyzer`] and exercise
//! the full pipeline without a live vision service. The provider handle
//! is constructed once and passed in explicitly — never read from
//! ambient global state.
//!
//! ## Retry strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential
//! backoff (`retry_backoff_ms * 2^attempt`) avoids thundering-herd: with
//! 500 ms base and 3 retries the wait sequence is 500 ms → 1 s → 2 s.
//! Only transport-level failures are retried — a response that arrived
//! but contains no recoverable JSON is terminal for this unit.

use crate::config::SopConfig;
use crate::error::{SopError, UnitError};
use crate::prompts::{
    reference_format_context, ANALYSIS_INSTRUCTIONS, DEFAULT_SYSTEM_PROMPT,
    REFERENCE_IMAGE_CAPTION,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Worked-example material attached to the analysis request.
///
/// The reference image shows the model what a process-flow diagram looks
/// like; the format sample shows the JSON it should answer with. Both
/// are optional and both are context only — the prompt explicitly tells
/// the model not to copy them into the output.
#[derive(Clone, Default)]
pub struct ReferenceMaterial {
    /// A reference diagram, base64-encoded.
    pub image: Option<ImageData>,
    /// A sample of the expected output shape.
    pub format_sample: Option<String>,
}

impl ReferenceMaterial {
    /// Load reference material from the paths configured in `config`.
    ///
    /// A configured-but-missing file degrades to absent material with a
    /// WARN — reference material improves answers but is never required.
    pub async fn load(config: &SopConfig) -> Self {
        let image = match &config.reference_image {
            Some(path) => match tokio::fs::read(path).await {
                Ok(bytes) => Some(crate::pipeline::encode::encode_bytes_for_vlm(
                    &bytes,
                    "image/png",
                )),
                Err(e) => {
                    warn!("Reference image {} unreadable: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        let format_sample = match &config.reference_text {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Reference text {} unreadable: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        Self {
            image,
            format_sample,
        }
    }
}

/// What one analysis call produced.
#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    /// The raw response text — untrusted prose that usually contains JSON.
    pub text: String,
    /// Tokens in the request.
    pub input_tokens: u32,
    /// Tokens in the response.
    pub output_tokens: u32,
    /// Transport retries spent before this response arrived.
    pub retries: u32,
    /// Wall-clock duration of the call, in milliseconds.
    pub duration_ms: u64,
}

/// The vision-analysis collaborator.
///
/// Given one diagram image and optional reference material, return the
/// model's free-form description. Implementations must be `Send + Sync`
/// so a future parallel batch can share one analyzer.
#[async_trait]
pub trait FlowAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        diagram: ImageData,
        reference: &ReferenceMaterial,
    ) -> Result<AnalysisResponse, UnitError>;
}

/// Production [`FlowAnalyzer`] backed by an `edgequake-llm` provider.
pub struct VlmFlowAnalyzer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl VlmFlowAnalyzer {
    /// Wrap a provider with the request knobs from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &SopConfig) -> Self {
        Self {
            provider,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Assemble the message stack for one analysis request.
    ///
    /// ## Message layout
    ///
    /// 1. **System message** — the analyst persona (or caller override)
    /// 2. **Reference image** *(optional)* — with its fixed caption
    /// 3. **Format sample** *(optional)* — the "Output Format" text
    /// 4. **User message** — the instruction block demanding the JSON
    ///    shape, with the diagram attached
    fn build_messages(&self, diagram: ImageData, reference: &ReferenceMaterial) -> Vec<ChatMessage> {
        let system_prompt = self
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let mut messages = vec![ChatMessage::system(system_prompt)];

        if let Some(ref_image) = &reference.image {
            messages.push(ChatMessage::user_with_images(
                REFERENCE_IMAGE_CAPTION,
                vec![ref_image.clone()],
            ));
        }

        if let Some(sample) = &reference.format_sample {
            messages.push(ChatMessage::user(reference_format_context(sample)));
        }

        messages.push(ChatMessage::user_with_images(
            ANALYSIS_INSTRUCTIONS,
            vec![diagram],
        ));

        messages
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl FlowAnalyzer for VlmFlowAnalyzer {
    async fn analyze(
        &self,
        diagram: ImageData,
        reference: &ReferenceMaterial,
    ) -> Result<AnalysisResponse, UnitError> {
        let start = Instant::now();
        let messages = self.build_messages(diagram, reference);
        let options = self.build_options();
        let call_timeout = Duration::from_secs(self.api_timeout_secs);

        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Analysis retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            // The analysis call is the only network-bound operation with
            // unbounded latency in the pipeline; a timeout here counts as
            // a transient failure and is retried like any other.
            match timeout(call_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    let duration = start.elapsed();
                    debug!(
                        "Analysis: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens, response.completion_tokens, duration
                    );

                    if response.content.trim().is_empty() {
                        return Err(UnitError::AnalysisFailed {
                            detail: "model returned an empty response".into(),
                        });
                    }

                    return Ok(AnalysisResponse {
                        text: response.content,
                        input_tokens: response.prompt_tokens as u32,
                        output_tokens: response.completion_tokens as u32,
                        retries: attempt,
                        duration_ms: duration.as_millis() as u64,
                    });
                }
                Ok(Err(e)) => {
                    last_err = format!("{}", e);
                    warn!("Analysis attempt {} failed — {}", attempt + 1, last_err);
                }
                Err(_) => {
                    last_err = format!("timed out after {}s", self.api_timeout_secs);
                    warn!("Analysis attempt {} {}", attempt + 1, last_err);
                }
            }
        }

        Err(UnitError::AnalysisFailed {
            detail: format!(
                "no usable output after {} retries: {}",
                self.max_retries, last_err
            ),
        })
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, SopError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SopError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the analysis collaborator, from most-specific to least-specific.
///
/// The fallback chain lets library users, CLI users, and tests each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built analyzer** (`config.analyzer`) — the full collaborator
///    supplied by the caller. This is how tests substitute a stub.
///
/// 2. **Pre-built provider** (`config.provider`) — the caller constructed
///    the LLM provider (custom middleware, caching); we wrap it.
///
/// 3. **Named provider + model** (`config.provider_name`) — we call
///    [`ProviderFactory::create_llm_provider`], which reads the matching
///    API key (`OPENAI_API_KEY`, …) from the environment.
///
/// 4. **Environment pair** (`PDF2SOP_LLM_PROVIDER` + `PDF2SOP_MODEL`) —
///    a provider and model chosen at the execution-environment level
///    (Makefile, shell script, CI). Checked before full auto-detection
///    so the model choice is honoured even when multiple API keys are
///    present.
///
/// 5. **Full auto-detection** (`ProviderFactory::from_env`) — scans all
///    known API key variables and picks the first available provider,
///    preferring OpenAI when its key is present.
pub fn resolve_analyzer(config: &SopConfig) -> Result<Arc<dyn FlowAnalyzer>, SopError> {
    // 1) User-provided collaborator takes priority
    if let Some(analyzer) = &config.analyzer {
        return Ok(Arc::clone(analyzer));
    }

    // 2) User-provided provider
    if let Some(provider) = &config.provider {
        return Ok(Arc::new(VlmFlowAnalyzer::new(
            Arc::clone(provider),
            config,
        )));
    }

    // 3) Provider name + model
    if let Some(name) = &config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        let provider = create_vision_provider(name, model)?;
        return Ok(Arc::new(VlmFlowAnalyzer::new(provider, config)));
    }

    // 4) Environment pair
    if let (Ok(prov), Ok(model)) = (
        std::env::var("PDF2SOP_LLM_PROVIDER"),
        std::env::var("PDF2SOP_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_vision_provider(&prov, &model)?;
            return Ok(Arc::new(VlmFlowAnalyzer::new(provider, config)));
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present, so
    // users with multiple provider keys get a deterministic default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            let provider = create_vision_provider("openai", model)?;
            return Ok(Arc::new(VlmFlowAnalyzer::new(provider, config)));
        }
    }

    // 5) Full auto-detection
    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SopError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(VlmFlowAnalyzer::new(provider, config)))
}

/// Default vision model when none is configured.
const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reference_material_absent_paths_load_as_empty() {
        let config = SopConfig::default();
        let material = ReferenceMaterial::load(&config).await;
        assert!(material.image.is_none());
        assert!(material.format_sample.is_none());
    }

    #[tokio::test]
    async fn reference_material_missing_file_degrades() {
        let config = SopConfig::builder()
            .reference_image("/no/such/ref.png")
            .reference_text("/no/such/ref.txt")
            .build()
            .unwrap();
        let material = ReferenceMaterial::load(&config).await;
        assert!(material.image.is_none());
        assert!(material.format_sample.is_none());
    }

    #[tokio::test]
    async fn reference_material_reads_configured_files() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("ref_output.txt");
        tokio::fs::write(&text_path, "{\"title\": \"sample\"}")
            .await
            .unwrap();

        let config = SopConfig::builder().reference_text(&text_path).build().unwrap();
        let material = ReferenceMaterial::load(&config).await;
        assert_eq!(
            material.format_sample.as_deref(),
            Some("{\"title\": \"sample\"}")
        );
    }

    #[test]
    fn resolve_prefers_injected_analyzer() {
        struct Canned;

        #[async_trait]
        impl FlowAnalyzer for Canned {
            async fn analyze(
                &self,
                _diagram: ImageData,
                _reference: &ReferenceMaterial,
            ) -> Result<AnalysisResponse, UnitError> {
                Ok(AnalysisResponse {
                    text: "{}".into(),
                    input_tokens: 0,
                    output_tokens: 0,
                    retries: 0,
                    duration_ms: 0,
                })
            }
        }

        let config = SopConfig::builder()
            .analyzer(Arc::new(Canned))
            // Would fail provider construction if consulted:
            .provider_name("no-such-provider")
            .build()
            .unwrap();

        assert!(resolve_analyzer(&config).is_ok());
    }
}
