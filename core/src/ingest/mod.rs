//! File ingestion: uploaded documents to indexable text plus metadata.
//!
//! Pure transforms; deciding what to ingest belongs to the `file_upload` tool.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::store::{Metadata, MetadataValue};
use crate::{FusionError, Result};

/// Text and metadata ready for the data store
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedDocument {
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Pdf,
    Image,
    Binary,
}

/// MIME type guessed from the file extension
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn kind_of(mime: &str) -> FileKind {
    if mime.starts_with("text/") || mime == "application/json" {
        FileKind::Text
    } else if mime == "application/pdf" {
        FileKind::Pdf
    } else if mime.starts_with("image/") {
        FileKind::Image
    } else {
        FileKind::Binary
    }
}

/// Read `path` and turn it into an [`IngestedDocument`]
pub async fn ingest_file(path: &Path) -> Result<IngestedDocument> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| FusionError::Ingest(format!("cannot read {}: {e}", path.display())))?;
    if !meta.is_file() {
        return Err(FusionError::Ingest(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = guess_mime(path);

    let mut metadata = Metadata::new();
    metadata.insert("filename".into(), filename.clone().into());
    metadata.insert("file_type".into(), mime.into());
    metadata.insert("file_size".into(), meta.len().into());
    metadata.insert("source".into(), "file_upload".into());
    metadata.insert(
        "local_path".into(),
        MetadataValue::Text(path.to_string_lossy().into_owned()),
    );

    let content = match kind_of(mime) {
        FileKind::Text => {
            let bytes = tokio::fs::read(path).await?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
        FileKind::Pdf => match extract_pdf_pages(path).await {
            Some(pages) => {
                metadata.insert("page_count".into(), pages.len().into());
                render_pages(&pages)
            }
            None => format!("Binary file: {filename}"),
        },
        FileKind::Image => format!("Binary image file: {filename}"),
        FileKind::Binary => format!("Binary file: {filename}"),
    };

    debug!(target: "ingest", file = %filename, mime, bytes = meta.len(), "Ingested file");
    Ok(IngestedDocument { content, metadata })
}

fn render_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Page {}:\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split extracted PDF text into pages on form feeds
fn split_pages(text: &str) -> Vec<String> {
    text.split('\x0c')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(feature = "pdf")]
async fn extract_pdf_pages(path: &Path) -> Option<Vec<String>> {
    let owned = path.to_path_buf();
    // pdf-extract is synchronous and may panic on malformed input
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned)).await;
    match joined {
        Ok(Ok(text)) => Some(split_pages(&text)),
        Ok(Err(e)) => {
            warn!(target: "ingest", path = %path.display(), error = %e, "PDF text extraction failed");
            None
        }
        Err(e) => {
            warn!(target: "ingest", path = %path.display(), error = %e, "PDF extraction task aborted");
            None
        }
    }
}

#[cfg(not(feature = "pdf"))]
async fn extract_pdf_pages(path: &Path) -> Option<Vec<String>> {
    warn!(target: "ingest", path = %path.display(), "PDF support not compiled in");
    None
}

/// Pick a free name for `file_name` inside `dir`: `name.ext`, `name_1.ext`, ...
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = as_path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1usize;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Copy `source` into `upload_dir` under a unique name and return the new path.
///
/// A file that already lives directly in `upload_dir` is used in place.
pub async fn stage_upload(source: &Path, upload_dir: &Path) -> Result<PathBuf> {
    if !tokio::fs::try_exists(source).await.unwrap_or(false) {
        return Err(FusionError::Ingest(format!(
            "file not found: {}",
            source.display()
        )));
    }
    tokio::fs::create_dir_all(upload_dir).await.map_err(|e| {
        FusionError::Ingest(format!("cannot create {}: {e}", upload_dir.display()))
    })?;

    let dir = tokio::fs::canonicalize(upload_dir).await?;
    let src = tokio::fs::canonicalize(source).await?;
    if src.parent() == Some(dir.as_path()) {
        return Ok(src);
    }

    let file_name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FusionError::Ingest(format!("no file name in {}", source.display())))?;
    let dest = unique_destination(&dir, &file_name);
    tokio::fs::copy(&src, &dest).await?;

    debug!(target: "ingest", from = %src.display(), to = %dest.display(), "Staged upload");
    Ok(dest)
}
