//! # pdf2sop
//!
//! Turn process-flow diagrams embedded in PDFs into formatted Standard
//! Operating Procedure documents (`.docx`) using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Operations teams draw process flows as diagrams, then re-type them by
//! hand into SOP templates. This crate automates the boring half: a VLM
//! reads the diagram as a human would and answers with a structured
//! description; the crate recovers that structure from the model's
//! free-form response and renders it deterministically into a fixed,
//! multi-section SOP template — boilerplate, tables, pagination and all.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (or zip of PDFs)
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Extract  embedded raster images via pdfium (first image = diagram)
//!  ├─ 3. Encode   PNG → base64 ImageData
//!  ├─ 4. Analyze  one VLM call (gpt-4o-mini / claude / gemini / …)
//!  ├─ 5. Recover  pull the JSON record out of the free-form response
//!  └─ 6. Assemble render the fixed SOP template → .docx bytes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2sop::{convert, SopConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = SopConfig::default();
//!     let output = convert("process_flow.pdf", &config).await?;
//!     std::fs::write("process_flow.docx", &output.docx)?;
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! Batches go through [`convert_archive`]: a zip of PDFs in, a zip of
//! `.docx` documents out, one entry per input that produced a document.
//! A failing entry is logged and skipped; it never aborts the batch.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2sop` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! pdf2sop = { version = "0.3", default-features = false }
//! ```
//!
//! ## Testing without a live model
//!
//! The vision collaborator sits behind the
//! [`FlowAnalyzer`](crate::pipeline::analyze::FlowAnalyzer) trait and is
//! injected via [`SopConfigBuilder::analyzer`](crate::config::SopConfigBuilder::analyzer).
//! Supply a stub that returns canned text and the whole pipeline —
//! recovery, assembly, batching — runs without a network connection.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod recovery;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::convert_archive;
pub use config::{SopConfig, SopConfigBuilder};
pub use convert::{convert, convert_pdf_bytes, convert_sync, convert_to_file};
pub use error::{SopError, UnitError};
pub use output::{BatchOutput, BatchStats, EntryResult, SopOutput, UnitStats};
pub use pipeline::analyze::{AnalysisResponse, FlowAnalyzer, ReferenceMaterial};
pub use progress::{BatchProgress, BatchProgressCallback, NoopBatchProgress};
pub use record::{ActivityRecord, AnalysisRecord, StepRecord, Steps};
pub use recovery::recover;
