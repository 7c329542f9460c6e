//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! ## Why download to a temp file?
//!
//! A downloaded input needs to outlive this call so the orchestrators can
//! re-read it (and report its path in errors). Downloading into a
//! `TempDir` gives us that while ensuring cleanup happens automatically
//! when `ResolvedInput` is dropped, even if the process panics. We
//! validate the magic bytes (`%PDF` for containers, `PK` for batch
//! archives) before returning so callers get a meaningful error rather
//! than a downstream crash.

use crate::error::SopError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What kind of container the resolved input holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A single PDF container.
    Pdf,
    /// A zip archive of PDF containers.
    Archive,
}

/// The resolved input — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: InputKind },
    /// Input was a URL; the file was downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing
    /// completes.
    Downloaded {
        path: PathBuf,
        kind: InputKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Get the local path regardless of how the input was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// What the magic bytes said this file is.
    pub fn kind(&self) -> InputKind {
        match self {
            ResolvedInput::Local { kind, .. } => *kind,
            ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, SopError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Classify a file by its first bytes: `%PDF` or zip's `PK`.
fn classify_magic(path: &Path, magic: &[u8]) -> Result<InputKind, SopError> {
    if magic.starts_with(b"%PDF") {
        Ok(InputKind::Pdf)
    } else if magic.starts_with(b"PK") {
        Ok(InputKind::Archive)
    } else {
        let mut first = [0u8; 4];
        let n = magic.len().min(4);
        first[..n].copy_from_slice(&magic[..n]);
        Err(SopError::UnrecognizedContainer {
            path: path.to_path_buf(),
            magic: first,
        })
    }
}

/// Resolve a local file path, validating existence and magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, SopError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(SopError::FileNotFound { path });
    }

    // Check read permission by attempting to open
    let kind = match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            let n = f.read(&mut magic).unwrap_or(0);
            classify_magic(&path, &magic[..n])?
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SopError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(SopError::FileNotFound { path });
        }
    };

    debug!("Resolved local input: {} ({:?})", path.display(), kind);
    Ok(ResolvedInput::Local { path, kind })
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, SopError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SopError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            SopError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SopError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(SopError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| SopError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SopError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let kind = classify_magic(&file_path, &bytes)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| SopError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {} ({:?})", file_path.display(), kind);

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/flow.pdf"));
        assert!(is_url("http://example.com/flows.zip"));
        assert!(!is_url("/tmp/flow.pdf"));
        assert!(!is_url("flow.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn classify_recognizes_pdf_and_zip() {
        let p = Path::new("x");
        assert_eq!(classify_magic(p, b"%PDF-1.7").unwrap(), InputKind::Pdf);
        assert_eq!(classify_magic(p, b"PK\x03\x04").unwrap(), InputKind::Archive);
        assert!(classify_magic(p, b"GIF8").is_err());
        assert!(classify_magic(p, b"").is_err());
    }

    #[test]
    fn local_pdf_resolves_with_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.4 fake body").unwrap();

        let resolved = resolve_local(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved.kind(), InputKind::Pdf);
        assert_eq!(resolved.path(), path);
    }

    #[test]
    fn missing_local_file_errors() {
        let err = resolve_local("/definitely/not/a/real/file.pdf").unwrap_err();
        assert!(matches!(err, SopError::FileNotFound { .. }));
    }

    #[test]
    fn extract_filename_from_url_path() {
        assert_eq!(
            extract_filename("https://example.com/docs/flow.pdf"),
            "flow.pdf"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.pdf");
    }
}
