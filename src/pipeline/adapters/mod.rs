//! Local collaborators used by the binary: a folder catalog, a command-line
//! converter, and file-backed readers for the produced renditions.

pub mod local;
pub mod markup;

pub use local::{CommandConverter, LocalFolderCatalog, LocalRenditionFetcher};
pub use markup::{parse_markup, HtmlDocumentReader};
