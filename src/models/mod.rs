pub mod enums;
pub mod glossary;
pub mod ledger;
pub mod lenient;
pub mod registry;

pub use glossary::*;
pub use ledger::*;
pub use registry::*;
