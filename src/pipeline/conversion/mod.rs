//! Source registry build and rendition conversion.

pub mod error;
pub mod stage;
pub mod traits;

pub use error::ConversionError;
pub use stage::{build_registry, is_conversion_complete, run_batch_conversion};
pub use traits::{ConversionRequest, DocumentConverter, SourceCatalog};
