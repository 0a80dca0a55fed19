use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::traits::DocumentLoader;
use crate::types::Document;

/// Loads `.txt` and `.pdf` files from the top level of a folder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl FsLoader {
    pub fn new() -> Self {
        Self
    }

    /// Bytes that are not valid UTF-8 are dropped, not replaced.
    fn read_txt(path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        match String::from_utf8(bytes) {
            Ok(content) => Ok(content),
            Err(err) => {
                tracing::warn!(path = %path.display(), "dropping invalid UTF-8 bytes");
                Ok(err.as_bytes().utf8_chunks().map(|chunk| chunk.valid()).collect())
            }
        }
    }

    fn read_pdf(path: &Path) -> Result<String> {
        pdf_extract::extract_text(path).map_err(|e| Error::Extract {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Text,
    Pdf,
}

fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" => Some(SourceKind::Text),
        "pdf" => Some(SourceKind::Pdf),
        _ => None,
    }
}

impl DocumentLoader for FsLoader {
    fn load(&self, folder: &Path) -> Result<Vec<Document>> {
        if !folder.exists() {
            tracing::warn!(folder = %folder.display(), "document folder does not exist");
            return Ok(Vec::new());
        }
        let mut documents = Vec::new();
        let entries = walkdir::WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() > 0 => {
                    tracing::warn!(path = ?err.path(), error = %err, "skipping unreadable entry");
                    continue;
                }
                Err(err) => return Err(Error::Io(err.into())),
            };
            // Symlinks are followed, so this is the target's type.
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(kind) = source_kind(path) else { continue };
            let text = match kind {
                SourceKind::Text => Self::read_txt(path)?,
                SourceKind::Pdf => Self::read_pdf(path)?,
            };
            let source = entry.file_name().to_string_lossy().to_string();
            tracing::debug!(%source, chars = text.chars().count(), "loaded document");
            documents.push(Document { source, text });
        }
        tracing::debug!(
            folder = %folder.display(),
            documents = documents.len(),
            "listed documents"
        );
        Ok(documents)
    }
}
