//! Configuration types for PDF-to-SOP conversion.
//!
//! All conversion behaviour is controlled through [`SopConfig`], built
//! via its [`SopConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across calls, serialise the scalar knobs
//! for logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new
//! field. The builder lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::error::SopError;
use crate::pipeline::analyze::FlowAnalyzer;
use crate::progress::BatchProgress;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a PDF-to-SOP conversion.
///
/// Built via [`SopConfig::builder()`] or [`SopConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2sop::SopConfig;
///
/// let config = SopConfig::builder()
///     .model("gpt-4o-mini")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SopConfig {
    /// LLM model identifier, e.g. "gpt-4o-mini", "claude-sonnet-4-20250514".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, auto-detection from the environment
    /// applies.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed analysis collaborator. Takes precedence over every
    /// provider field — this is the seam tests use to run the full
    /// pipeline without a live vision service.
    pub analyzer: Option<Arc<dyn FlowAnalyzer>>,

    /// Sampling temperature for the analysis completion. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the boxes and arrows
    /// it actually sees, and makes the JSON shape far more likely to come
    /// back intact. Higher values add creativity the recovery step then
    /// has to survive.
    pub temperature: f32,

    /// Maximum tokens the model may generate per diagram. Default: 4096.
    ///
    /// Dense diagrams with many branches produce long step lists.
    /// Setting this too low truncates the JSON mid-object, which recovery
    /// correctly rejects — so the ceiling errs high.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient analysis failure. Default: 3.
    ///
    /// Retries cover transport-level failures (5xx, timeouts) only. A
    /// response that came back but contains no recoverable JSON is never
    /// retried — the model is deterministic enough per call that feeding
    /// it the same image again from here is the caller's decision.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff).
    /// Default: 500. Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Optional reference diagram attached to the request as a worked
    /// example for the model.
    pub reference_image: Option<PathBuf>,

    /// Optional reference output sample (the "Output Format" text)
    /// attached to the request.
    pub reference_text: Option<PathBuf>,

    /// Display width of the embedded process-flow image, in inches.
    /// Default: 6.0 — the width of the content area on US Letter with
    /// default margins. Height follows the image's aspect ratio.
    pub image_width_inches: f32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-analysis-call timeout in seconds. Default: 60.
    ///
    /// The analysis call is the only network-bound operation with
    /// unbounded latency in the pipeline, and therefore the only
    /// suspension point worth guarding.
    pub api_timeout_secs: u64,

    /// Progress callback for batch conversions.
    pub progress: Option<BatchProgress>,
}

impl Default for SopConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            analyzer: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
            reference_image: None,
            reference_text: None,
            image_width_inches: 6.0,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress: None,
        }
    }
}

impl fmt::Debug for SopConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SopConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("analyzer", &self.analyzer.as_ref().map(|_| "<dyn FlowAnalyzer>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("reference_image", &self.reference_image)
            .field("reference_text", &self.reference_text)
            .field("image_width_inches", &self.image_width_inches)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl SopConfig {
    /// Create a new builder for `SopConfig`.
    pub fn builder() -> SopConfigBuilder {
        SopConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SopConfig`].
#[derive(Debug)]
pub struct SopConfigBuilder {
    config: SopConfig,
}

impl SopConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn FlowAnalyzer>) -> Self {
        self.config.analyzer = Some(analyzer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn reference_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.reference_image = Some(path.into());
        self
    }

    pub fn reference_text(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.reference_text = Some(path.into());
        self
    }

    pub fn image_width_inches(mut self, inches: f32) -> Self {
        self.config.image_width_inches = inches.clamp(1.0, 8.0);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress(mut self, progress: BatchProgress) -> Self {
        self.config.progress = Some(progress);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SopConfig, SopError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(SopError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(SopError::InvalidConfig(format!(
                "temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(SopError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SopConfig::default();
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.image_width_inches, 6.0);
        assert!(config.analyzer.is_none());
    }

    #[test]
    fn builder_clamps_temperature() {
        let config = SopConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn builder_clamps_image_width() {
        let config = SopConfig::builder().image_width_inches(42.0).build().unwrap();
        assert_eq!(config.image_width_inches, 8.0);
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        let err = SopConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn debug_elides_dyn_fields() {
        let repr = format!("{:?}", SopConfig::default());
        assert!(repr.contains("SopConfig"));
        assert!(!repr.contains("Arc"));
    }
}
