//! Uploaded source documents

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Stable identifier of an uploaded document within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Advisory file category, guessed from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Document,
    Image,
    Text,
    Other,
}

impl DocumentKind {
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf" | "doc" | "docx" | "odt" | "rtf") => Self::Document,
            Some("png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "webp" | "heic") => {
                Self::Image
            }
            Some("txt" | "text" | "md" | "csv") => Self::Text,
            _ => Self::Other,
        }
    }

    pub fn is_allowed(self) -> bool {
        !matches!(self, Self::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Removed,
}

/// A file handed to the upload surface
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub display_name: String,
    pub content: Vec<u8>,
}

impl NewDocument {
    pub fn new(display_name: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            display_name: display_name.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedDocument {
    pub id: DocumentId,
    pub display_name: String,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip)]
    content: Vec<u8>,
}

impl UploadedDocument {
    pub fn upload(doc: NewDocument) -> Self {
        Self {
            id: DocumentId::new(),
            kind: DocumentKind::from_name(&doc.display_name),
            display_name: doc.display_name,
            status: DocumentStatus::Uploaded,
            uploaded_at: Utc::now(),
            content: doc.content,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Content as UTF-8 text, if it is valid text
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    pub(crate) fn mark_removed(mut self) -> Self {
        self.status = DocumentStatus::Removed;
        self
    }
}
