//! Result types returned by the conversion entry points.

use crate::error::UnitError;
use crate::record::AnalysisRecord;
use serde::{Deserialize, Serialize};

/// The result of converting one PDF into one SOP document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SopOutput {
    /// The assembled `.docx` document.
    #[serde(skip)]
    pub docx: Vec<u8>,

    /// The analysis recovered from the model response, as rendered into
    /// the document.
    pub record: AnalysisRecord,

    /// Timing and token accounting for this unit.
    pub stats: UnitStats,
}

/// Statistics for a single-unit conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitStats {
    /// Embedded images found in the container (only the first is used).
    pub images_found: usize,
    /// Tokens sent to the vision model.
    pub input_tokens: u32,
    /// Tokens generated by the vision model.
    pub output_tokens: u32,
    /// Transport-level retries spent on the analysis call.
    pub retries: u32,
    /// Wall-clock time of the analysis call, in milliseconds.
    pub analysis_duration_ms: u64,
    /// Wall-clock time of template assembly, in milliseconds.
    pub assembly_duration_ms: u64,
    /// End-to-end wall-clock time for the unit, in milliseconds.
    pub total_duration_ms: u64,
}

/// The result of converting an archive of PDFs.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// The output zip archive: one `<base>.docx` entry per success.
    pub archive: Vec<u8>,
    /// One result per qualifying input entry, in input order.
    pub entries: Vec<EntryResult>,
    /// Batch-level accounting.
    pub stats: BatchStats,
}

/// Outcome of one archive entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResult {
    /// The input entry name as it appeared in the archive.
    pub name: String,
    /// The output entry name (`<base>.docx`) when the unit succeeded.
    pub output_name: Option<String>,
    /// Why the unit produced no output, when it failed.
    pub error: Option<UnitError>,
}

impl EntryResult {
    /// True when this entry contributed a document to the output archive.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistics for a batch conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Entries in the input archive, of any kind.
    pub total_entries: usize,
    /// Entries whose name ends in `.pdf` (case-insensitive).
    pub qualifying_entries: usize,
    /// Qualifying entries that produced a document.
    pub succeeded: usize,
    /// Qualifying entries that produced no output.
    pub failed: usize,
    /// End-to-end wall-clock time for the batch, in milliseconds.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_result_success_flag() {
        let ok = EntryResult {
            name: "a.pdf".into(),
            output_name: Some("a.docx".into()),
            error: None,
        };
        let failed = EntryResult {
            name: "b.pdf".into(),
            output_name: None,
            error: Some(UnitError::NoImageFound),
        };
        assert!(ok.succeeded());
        assert!(!failed.succeeded());
    }

    #[test]
    fn sop_output_serializes_without_docx_bytes() {
        let output = SopOutput {
            docx: vec![1, 2, 3],
            record: AnalysisRecord::default(),
            stats: UnitStats::default(),
        };
        let json = serde_json::to_string(&output).unwrap();
        assert!(!json.contains("docx"), "raw bytes must not leak into JSON");
        assert!(json.contains("stats"));
    }
}
