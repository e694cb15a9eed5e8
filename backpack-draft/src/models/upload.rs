//! Files queued for upload

use crate::error::{DraftError, DraftResult};
use std::path::Path;

/// One file in an upload batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    /// Build from in-memory content; mime type guessed from the file name
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            mime_type,
            content,
        }
    }

    /// Read a file from disk
    pub async fn from_path(path: &Path) -> DraftResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DraftError::InvalidInput(format!("Not a file path: {}", path.display()))
            })?
            .to_string();
        let content = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, content))
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}
