//! Repository layer: table-scoped database operations.
//!
//! All public functions are re-exported here.

mod glossary;
mod ledger;
mod raw_rows;
mod registry;

pub use glossary::*;
pub use ledger::*;
pub use raw_rows::*;
pub use registry::*;
