//! Batch conversion: a zip of PDFs in, a zip of SOP documents out.
//!
//! Entries are processed strictly sequentially, in archive order. A
//! failing entry is recorded and skipped — it never aborts the batch.
//! Only two conditions are fatal: the input is not a readable zip, and
//! the batch produced nothing at all ([`SopError::EmptyBatch`], raised
//! both when no entry qualifies and when every qualifying entry failed).
//!
//! The analysis collaborator is resolved **once** up front and shared by
//! every entry; per-entry work therefore cannot fail on provider
//! configuration, and a misconfigured environment fails fast before any
//! model call is made.

use crate::config::SopConfig;
use crate::convert::convert_pdf_bytes;
use crate::error::{SopError, UnitError};
use crate::output::{BatchOutput, BatchStats, EntryResult};
use crate::pipeline::analyze::resolve_analyzer;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Recognized container suffix for batch entries (case-insensitive).
const PDF_SUFFIX: &str = ".pdf";
/// Suffix of output archive entries.
const DOCX_SUFFIX: &str = ".docx";

/// Convert every `.pdf` entry of a zip archive into an SOP document.
///
/// # Errors
/// * [`SopError::InvalidArchive`] — the bytes are not a readable zip.
/// * [`SopError::EmptyBatch`] — no qualifying entry, or none succeeded.
/// * Provider-resolution errors, before any entry is processed.
pub async fn convert_archive(
    archive_bytes: &[u8],
    config: &SopConfig,
) -> Result<BatchOutput, SopError> {
    let total_start = Instant::now();

    let mut archive =
        ZipArchive::new(Cursor::new(archive_bytes)).map_err(|e| SopError::InvalidArchive {
            detail: e.to_string(),
        })?;
    let total_entries = archive.len();

    // ── Collect qualifying entries ───────────────────────────────────────
    let mut units: Vec<(String, Vec<u8>)> = Vec::new();
    for index in 0..total_entries {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| SopError::InvalidArchive {
                detail: e.to_string(),
            })?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_string();
        if !name.to_ascii_lowercase().ends_with(PDF_SUFFIX) {
            debug!("Ignoring non-PDF entry: {}", name);
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut bytes) {
            // An unreadable entry is a per-entry failure, not a batch one.
            warn!("Cannot read archive entry {}: {}", name, e);
            continue;
        }
        units.push((name, bytes));
    }

    let qualifying = units.len();
    info!(
        "Batch: {} qualifying of {} entries",
        qualifying, total_entries
    );

    if qualifying == 0 {
        return Err(SopError::EmptyBatch {
            qualifying: 0,
            total: total_entries,
        });
    }

    // ── Resolve the collaborator once for the whole batch ────────────────
    let mut unit_config = config.clone();
    unit_config.analyzer = Some(resolve_analyzer(config)?);

    if let Some(cb) = &config.progress {
        cb.on_batch_start(qualifying);
    }

    // ── Process entries sequentially ─────────────────────────────────────
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut entries = Vec::with_capacity(qualifying);
    let mut succeeded = 0usize;

    for (unit_num, (name, bytes)) in units.into_iter().enumerate() {
        let unit_num = unit_num + 1;
        if let Some(cb) = &config.progress {
            cb.on_unit_start(unit_num, qualifying, &name);
        }

        match convert_pdf_bytes(bytes, &unit_config).await {
            Ok(output) => {
                let output_name = output_entry_name(&name);
                let write_result = match writer.start_file(output_name.clone(), options) {
                    Ok(()) => writer.write_all(&output.docx).map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };

                match write_result {
                    Ok(()) => {
                        succeeded += 1;
                        if let Some(cb) = &config.progress {
                            cb.on_unit_complete(unit_num, qualifying, output.docx.len());
                        }
                        entries.push(EntryResult {
                            name,
                            output_name: Some(output_name),
                            error: None,
                        });
                    }
                    Err(detail) => {
                        let error = UnitError::AssemblyFailed { detail };
                        warn!("Entry {} skipped: {}", name, error);
                        if let Some(cb) = &config.progress {
                            cb.on_unit_error(unit_num, qualifying, error.to_string());
                        }
                        entries.push(EntryResult {
                            name,
                            output_name: None,
                            error: Some(error),
                        });
                    }
                }
            }
            Err(e) => {
                // A PDF that cannot be opened at all has no extractable
                // diagram; anything else fatal was ruled out by resolving
                // the collaborator up front.
                let error = match e {
                    SopError::Unit(unit) => unit,
                    other => {
                        warn!("Entry {} unreadable as PDF: {}", name, other);
                        UnitError::NoImageFound
                    }
                };
                warn!("Entry {} skipped: {}", name, error);
                if let Some(cb) = &config.progress {
                    cb.on_unit_error(unit_num, qualifying, error.to_string());
                }
                entries.push(EntryResult {
                    name,
                    output_name: None,
                    error: Some(error),
                });
            }
        }
    }

    if let Some(cb) = &config.progress {
        cb.on_batch_complete(qualifying, succeeded);
    }

    if succeeded == 0 {
        return Err(SopError::EmptyBatch {
            qualifying,
            total: total_entries,
        });
    }

    let archive = writer
        .finish()
        .map_err(|e| SopError::Internal(format!("cannot finalize output archive: {e}")))?
        .into_inner();

    let stats = BatchStats {
        total_entries,
        qualifying_entries: qualifying,
        succeeded,
        failed: qualifying - succeeded,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} entries, {}ms",
        succeeded, qualifying, stats.total_duration_ms
    );

    Ok(BatchOutput {
        archive,
        entries,
        stats,
    })
}

/// Output entry name: the input's base name with the document suffix.
///
/// Directory components are dropped — outputs land flat in the archive
/// root, keyed by file name.
fn output_entry_name(input_name: &str) -> String {
    let stem = Path::new(input_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_name.to_string());
    format!("{stem}{DOCX_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_use_base_name_and_docx_suffix() {
        assert_eq!(output_entry_name("order_intake.pdf"), "order_intake.docx");
        assert_eq!(output_entry_name("flows/claims.PDF"), "claims.docx");
        assert_eq!(output_entry_name("weird"), "weird.docx");
    }

    #[tokio::test]
    async fn garbage_bytes_are_an_invalid_archive() {
        let config = SopConfig::default();
        let err = convert_archive(b"not a zip at all", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SopError::InvalidArchive { .. }));
    }

    #[tokio::test]
    async fn archive_without_pdfs_is_an_empty_batch() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("notes.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let config = SopConfig::default();
        let err = convert_archive(&bytes, &config).await.unwrap_err();
        assert!(
            matches!(
                err,
                SopError::EmptyBatch {
                    qualifying: 0,
                    total: 1
                }
            ),
            "got: {err:?}"
        );
    }
}
