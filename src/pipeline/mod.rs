//! The conversion pipeline, one module per stage:
//!
//! ```text
//! PDF
//!  │
//!  ├─ input     resolve local file or download from URL
//!  ├─ extract   pull embedded raster images out of the PDF (pdfium)
//!  ├─ encode    PNG → base64 ImageData
//!  ├─ analyze   one VLM call per diagram (retry + timeout)
//!  │            → crate::recovery pulls the JSON out of the response
//!  └─ assemble  AnalysisRecord + diagram → SOP .docx
//! ```

pub mod analyze;
pub mod assemble;
pub mod encode;
pub mod extract;
pub mod input;
