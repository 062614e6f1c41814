//! Source documents read from disk

use bytes::Bytes;
use ragbridge_sdk::DocumentPayload;
use std::path::{Path, PathBuf};

use crate::{IngestionError, Result};

/// A local file prepared for upload
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// Base name; also the display name the backend lists the document under
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl SourceDocument {
    /// Base name of `path`, rejecting paths without one
    pub fn file_name_of(path: &Path) -> Result<String> {
        path.file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                IngestionError::InvalidInput(format!("{} has no file name", path.display()))
            })
    }

    /// Read a file and guess its MIME type from the extension
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = Self::file_name_of(path)?;

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            IngestionError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            mime_type,
            bytes: Bytes::from(bytes),
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn payload(&self) -> DocumentPayload {
        DocumentPayload {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_file_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        tokio::fs::write(&path, b"# Notes").await.unwrap();

        let doc = SourceDocument::from_file(&path).await.unwrap();

        assert_eq!(doc.file_name, "notes.md");
        assert_eq!(doc.mime_type, "text/markdown");
        assert_eq!(doc.size(), 7);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_octet_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.zzz");
        tokio::fs::write(&path, b"\x00\x01").await.unwrap();

        let doc = SourceDocument::from_file(&path).await.unwrap();
        assert_eq!(doc.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid_input() {
        let err = SourceDocument::from_file("/nonexistent/ragbridge/report.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unreadable_path_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();

        let err = SourceDocument::from_file(dir.path()).await.unwrap_err();

        assert!(matches!(err, IngestionError::InvalidInput(ref msg) if msg.contains("cannot read")));
        assert_eq!(err.class(), ragbridge_core::FailureClass::InvalidInput);
    }

    #[test]
    fn test_path_without_file_name() {
        assert!(SourceDocument::file_name_of(Path::new("/")).is_err());
        assert_eq!(
            SourceDocument::file_name_of(Path::new("a/b/c.txt")).unwrap(),
            "c.txt"
        );
    }
}
