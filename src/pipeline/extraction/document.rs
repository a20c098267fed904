//! Structured copy of a source document and its text view.
//!
//! The text view keeps table geometry visible to the model: every table row
//! is one line and every cell is bracketed, so column alignment survives
//! even when the visual rendition is ambiguous.

use super::error::ExtractionError;

pub const TABLE_START: &str = "--- TABLE START ---";
pub const TABLE_END: &str = "--- TABLE END ---";
pub const EMPTY_CELL: &str = "EMPTY";

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(String),
    /// Rows of cell texts.
    Table(Vec<Vec<String>>),
}

/// Header, body and footer of a document, each as a sequence of blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredDocument {
    pub header: Vec<Block>,
    pub body: Vec<Block>,
    pub footer: Vec<Block>,
}

impl StructuredDocument {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.is_empty() && self.footer.is_empty()
    }
}

/// Render header, body and footer in that order.
///
/// Paragraphs are trimmed and emitted one per line; blank ones are dropped.
/// Tables are framed by start/end markers, one line per row, each cell as
/// `[ text ] ` with `EMPTY` for a blank cell.
pub fn render_structured_text(doc: &StructuredDocument) -> String {
    let mut out = String::new();
    for block in doc.header.iter().chain(&doc.body).chain(&doc.footer) {
        match block {
            Block::Paragraph(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.push_str(text);
                    out.push('\n');
                }
            }
            Block::Table(rows) => {
                out.push('\n');
                out.push_str(TABLE_START);
                out.push('\n');
                for row in rows {
                    for cell in row {
                        let cell = cell.trim();
                        let cell = if cell.is_empty() { EMPTY_CELL } else { cell };
                        out.push_str("[ ");
                        out.push_str(cell);
                        out.push_str(" ] ");
                    }
                    out.push('\n');
                }
                out.push_str(TABLE_END);
                out.push_str("\n\n");
            }
        }
    }
    out
}

/// Opens the structured copy behind a rendition reference.
pub trait DocumentReader: Send + Sync {
    fn read(&self, reference: &str) -> Result<StructuredDocument, ExtractionError>;
}

/// Fetches the bytes of the visual rendition behind a reference.
pub trait RenditionFetcher: Send + Sync {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn paragraphs_are_trimmed_and_blank_ones_dropped() {
        let doc = StructuredDocument {
            body: vec![
                Block::Paragraph("  INVOICE 5001-A  ".into()),
                Block::Paragraph("   ".into()),
                Block::Paragraph("Sold To: Acme".into()),
            ],
            ..Default::default()
        };
        assert_eq!(render_structured_text(&doc), "INVOICE 5001-A\nSold To: Acme\n");
    }

    #[test]
    fn tables_are_framed_with_bracketed_cells() {
        let doc = StructuredDocument {
            body: vec![Block::Table(vec![
                cells(&["Qty", "Item #", "Price"]),
                cells(&["2", " ", "50.00"]),
            ])],
            ..Default::default()
        };
        assert_eq!(
            render_structured_text(&doc),
            "\n--- TABLE START ---\n[ Qty ] [ Item # ] [ Price ] \n[ 2 ] [ EMPTY ] [ 50.00 ] \n--- TABLE END ---\n\n"
        );
    }

    #[test]
    fn sections_render_header_body_footer() {
        let doc = StructuredDocument {
            header: vec![Block::Paragraph("HEADER".into())],
            body: vec![Block::Paragraph("BODY".into())],
            footer: vec![Block::Paragraph("FOOTER".into())],
        };
        assert_eq!(render_structured_text(&doc), "HEADER\nBODY\nFOOTER\n");
    }

    #[test]
    fn empty_document_renders_empty() {
        let doc = StructuredDocument::default();
        assert!(doc.is_empty());
        assert_eq!(render_structured_text(&doc), "");
    }
}
