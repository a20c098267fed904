//! Batch reconciliation of raw extraction rows into the canonical ledger.

pub mod collapse;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod prompt;
pub mod resolve;
pub mod types;

pub use collapse::{collapse_winners, is_replacement, CollapseKind};
pub use engine::{run_batch_reconciliation, ReconcileReport};
pub use error::{ChunkFault, ReconcileError};
pub use grouping::{group_pending, natural_cmp, parse_invoice_date, FilterStats, InvoiceGroup};
pub use types::{ReconciliationResponse, WinningInvoice, WinningLineItem};
