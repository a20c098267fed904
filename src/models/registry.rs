use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{ProcessingStatus, RenditionFormat};

/// One physical source document tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// 1-based row position; the persisted scan order.
    pub position: i64,
    /// Stable id; also the source reference handed to the converter.
    pub id: String,
    pub name: String,
    pub modified_at: NaiveDateTime,
    pub conversion_status: ProcessingStatus,
    pub structured_ref: Option<String>,
    pub markup_ref: Option<String>,
    pub visual_ref: Option<String>,
    pub extraction_status: ProcessingStatus,
}

impl SourceRecord {
    pub fn rendition_ref(&self, format: RenditionFormat) -> Option<&str> {
        let value = match format {
            RenditionFormat::Structured => self.structured_ref.as_deref(),
            RenditionFormat::Markup => self.markup_ref.as_deref(),
            RenditionFormat::Visual => self.visual_ref.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// A document as listed by the source catalog, before it enters the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub id: String,
    pub name: String,
    pub modified_at: NaiveDateTime,
    pub mime_type: String,
}

pub const MIME_TYPE_DOC: &str = "application/msword";
pub const MIME_TYPE_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

impl SourceDocument {
    pub fn is_word_document(&self) -> bool {
        self.mime_type == MIME_TYPE_DOC || self.mime_type == MIME_TYPE_DOCX
    }
}
