//! Single-unit conversion entry points: one PDF in, one SOP document out.
//!
//! The pipeline for one diagram is strictly sequential — each stage
//! completes or fails before the next begins, and every failure kind is
//! terminal for the unit:
//!
//! 1. Resolve the input (local path or URL) and read its bytes.
//! 2. Extract embedded images; none ⇒ [`UnitError::NoImageFound`].
//! 3. Take the **first** image as the process-flow diagram. One diagram
//!    per container is a deliberate, documented simplification: when a
//!    PDF embeds more than one image, the rest are ignored with a WARN.
//! 4. Ask the vision collaborator for a description;
//!    no usable text ⇒ [`UnitError::AnalysisFailed`].
//! 5. Recover the JSON record; ⇒ [`UnitError::RecoveryFailed`].
//! 6. Assemble the document; ⇒ [`UnitError::AssemblyFailed`].

use crate::config::SopConfig;
use crate::error::{SopError, UnitError};
use crate::output::{SopOutput, UnitStats};
use crate::pipeline::analyze::{resolve_analyzer, ReferenceMaterial};
use crate::pipeline::{assemble, encode, extract, input};
use crate::recovery;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL into an SOP document.
///
/// This is the primary single-unit entry point.
///
/// # Errors
/// * Fatal input problems (`FileNotFound`, `UnrecognizedContainer`, …)
/// * `SopError::Unit` wrapping the terminal per-unit failures of §steps
///   2–6 above — the input produced no output, reported as a typed
///   result, never a crash.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &SopConfig,
) -> Result<SopOutput, SopError> {
    let input_str = input_str.as_ref();
    info!("Starting SOP conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    if resolved.kind() != input::InputKind::Pdf {
        return Err(SopError::InvalidInput {
            input: format!("{input_str} is a zip archive — use convert_archive for batches"),
        });
    }

    let bytes = tokio::fs::read(resolved.path())
        .await
        .map_err(|e| SopError::Internal(format!("cannot read resolved input: {e}")))?;

    convert_pdf_bytes(bytes, config).await
}

/// Convert in-memory PDF bytes into an SOP document.
///
/// This is the entry point the batch orchestrator uses per archive entry;
/// it is also the recommended API when PDF data comes from a database or
/// network stream rather than a file on disk.
pub async fn convert_pdf_bytes(bytes: Vec<u8>, config: &SopConfig) -> Result<SopOutput, SopError> {
    let total_start = Instant::now();

    // ── Step 1: Extract embedded images ──────────────────────────────────
    let images = extract::extract_embedded_images(bytes).await?;
    let images_found = images.len();
    let diagram = images
        .into_iter()
        .next()
        .ok_or(UnitError::NoImageFound)?;
    if images_found > 1 {
        warn!(
            "Container embeds {} images; using the first as the process-flow diagram",
            images_found
        );
    }

    // ── Step 2: Resolve the analysis collaborator ────────────────────────
    let analyzer = resolve_analyzer(config)?;
    let reference = ReferenceMaterial::load(config).await;

    // ── Step 3: Analyze the diagram ──────────────────────────────────────
    let encoded = encode::encode_for_vlm(&diagram).map_err(|e| UnitError::AnalysisFailed {
        detail: format!("cannot encode diagram for analysis: {e}"),
    })?;
    let response = analyzer.analyze(encoded, &reference).await?;
    debug!(
        "Analysis returned {} chars in {}ms",
        response.text.len(),
        response.duration_ms
    );

    // ── Step 4: Recover the structured record ────────────────────────────
    let record = recovery::recover(&response.text)?;

    // ── Step 5: Assemble the document ────────────────────────────────────
    let assembly_start = Instant::now();
    let docx = assemble::assemble(&record, &diagram, config.image_width_inches)?;
    let assembly_duration_ms = assembly_start.elapsed().as_millis() as u64;

    let stats = UnitStats {
        images_found,
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
        retries: response.retries,
        analysis_duration_ms: response.duration_ms,
        assembly_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "SOP assembled: {} bytes, {}ms total",
        docx.len(),
        stats.total_duration_ms
    );

    Ok(SopOutput { docx, record, stats })
}

/// Convert a PDF and write the document directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &SopConfig,
) -> Result<UnitStats, SopError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SopError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, &output.docx)
        .await
        .map_err(|e| SopError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SopError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &SopConfig,
) -> Result<SopOutput, SopError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SopError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(input_str, config))
}
