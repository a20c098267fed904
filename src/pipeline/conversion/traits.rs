use crate::models::enums::RenditionFormat;
use crate::models::SourceDocument;

use super::error::ConversionError;

/// Lists the documents in the source location.
pub trait SourceCatalog: Send + Sync {
    fn list_documents(&self) -> Result<Vec<SourceDocument>, ConversionError>;
}

/// One rendition to produce for one source document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest<'a> {
    pub source_ref: &'a str,
    pub name: &'a str,
    pub format: RenditionFormat,
    /// Structured copy, once it exists. Markup and visual renditions may be
    /// exported from it instead of from the source.
    pub structured_ref: Option<&'a str>,
}

/// Produces renditions and returns a reference to each.
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, request: &ConversionRequest<'_>) -> Result<String, ConversionError>;
}
