//! Single-record extraction: text view + visual rendition in, raw ledger rows out.

pub mod document;
pub mod error;
pub mod extractor;
pub mod prompt;
pub mod stage;
pub mod types;

pub use document::{render_structured_text, Block, DocumentReader, RenditionFetcher, StructuredDocument};
pub use error::ExtractionError;
pub use extractor::{derive_unit_cost, flatten_rows, SingleRecordExtractor};
pub use stage::{run_batch_extraction, setup_extraction_table};
pub use types::StructuredExtraction;
