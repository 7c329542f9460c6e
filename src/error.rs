//! Error types for the pdf2sop library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SopError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, unreadable archive, provider not configured).
//!   Returned as `Err(SopError)` from the top-level `convert*` functions.
//!
//! * [`UnitError`] — **Per-unit**: one PDF in a batch produced no output
//!   (no embedded image, unusable model response, rendering failure) but
//!   the other entries are unaffected. Stored inside
//!   [`crate::output::EntryResult`] so batch callers can inspect which
//!   inputs produced nothing rather than losing the whole batch to one
//!   bad entry.
//!
//! For single-PDF conversion a `UnitError` *is* terminal, so [`SopError`]
//! wraps it via `From` — the caller still gets a typed result, never a
//! panic across the component boundary.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2sop library.
///
/// Per-entry batch failures use [`UnitError`] and are stored in
/// [`crate::output::EntryResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SopError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is neither a PDF nor a zip archive.
    #[error("File is not a valid PDF or zip archive: '{path}'\nFirst bytes: {magic:?}")]
    UnrecognizedContainer { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { detail: String },

    // ── Archive errors ────────────────────────────────────────────────────
    /// The batch input could not be opened as a zip archive.
    #[error("Cannot read zip archive: {detail}")]
    InvalidArchive { detail: String },

    /// No entry in the batch produced a document.
    ///
    /// Raised both when the archive contains no `.pdf` entries at all and
    /// when every qualifying entry failed. The caller reports "no output
    /// produced" either way; per-entry reasons live in
    /// [`crate::output::BatchOutput::entries`].
    #[error("No SOP documents produced from {qualifying} qualifying entries ({total} total)")]
    EmptyBatch { qualifying: usize, total: usize },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Unit failure on a single-PDF conversion ───────────────────────────
    /// The one unit being converted produced no output.
    #[error(transparent)]
    Unit(#[from] UnitError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A terminal failure for a single diagram unit.
///
/// Inside a batch these are recorded per entry and the batch continues;
/// none of them is recoverable mid-pipeline, and none is retried for the
/// same input (re-invoking the vision collaborator is a caller policy,
/// not ours).
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The PDF container held no extractable raster image.
    #[error("No embedded image found in the PDF — nothing to analyze")]
    NoImageFound,

    /// The vision collaborator returned no usable text.
    #[error("Diagram analysis failed: {detail}")]
    AnalysisFailed { detail: String },

    /// No valid JSON object could be recovered from the model response.
    #[error("No valid JSON object recoverable from model response: {detail}")]
    RecoveryFailed { detail: String },

    /// Template rendering or the output sink write failed.
    #[error("SOP document assembly failed: {detail}")]
    AssemblyFailed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_display() {
        let e = SopError::EmptyBatch {
            qualifying: 3,
            total: 5,
        };
        let msg = e.to_string();
        assert!(msg.contains("3 qualifying"), "got: {msg}");
        assert!(msg.contains("5 total"), "got: {msg}");
    }

    #[test]
    fn unit_error_passes_through_transparently() {
        let unit = UnitError::NoImageFound;
        let fatal: SopError = unit.clone().into();
        assert_eq!(fatal.to_string(), unit.to_string());
    }

    #[test]
    fn recovery_failed_display() {
        let e = UnitError::RecoveryFailed {
            detail: "no fenced block".into(),
        };
        assert!(e.to_string().contains("no fenced block"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = SopError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "set OPENAI_API_KEY".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("openai"));
        assert!(msg.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn unit_error_serializes() {
        let e = UnitError::AnalysisFailed {
            detail: "timeout".into(),
        };
        let json = serde_json::to_string(&e).expect("UnitError must serialize");
        assert!(json.contains("AnalysisFailed"));
    }
}
