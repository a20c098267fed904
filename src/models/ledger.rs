use serde::{Deserialize, Serialize};

use super::enums::InconsistencyLevel;

/// Marker written in place of a glossary value that could not be resolved.
pub const UNMAPPED: &str = "UNMAPPED";
pub const UNKNOWN: &str = "UNKNOWN";

/// Prefix of a full id that fuses several source records into one invoice.
pub const MERGE_SENTINEL: &str = "MERGED";
pub const MERGE_DELIMITER: char = '|';

/// One line item from one extraction attempt. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtractionRow {
    pub source_file: String,
    pub modified_at: String,
    pub invoice_id_full: String,
    pub invoice_id_base: String,
    pub date: String,
    pub origin_address: String,
    pub sold_to: String,
    pub sold_to_attn: String,
    pub ship_to_raw: String,
    pub ship_to: String,
    pub ship_to_attn: String,
    pub po_number: String,
    pub salesperson: String,
    pub terms: String,
    pub shipped_via: String,
    pub fob: String,
    pub qty: f64,
    pub item_no: String,
    pub description: String,
    pub unit_cost: Option<f64>,
    pub extended_total: Option<f64>,
    pub line_category: String,
    pub parent_description: String,
    pub sub_details: String,
    pub rental_period: String,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub cc_fees: f64,
    pub intl_fees: f64,
    pub discount_line: f64,
    pub discount_invoice: f64,
    pub grand_total: f64,
    pub currency: String,
    pub invoice_type: String,
    pub inconsistency_level: String,
    pub inconsistency_notes: String,
    pub math_check: String,
}

/// The reconciled record for one base transaction id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalInvoice {
    pub invoice_id_base: String,
    /// Winning full id, or `MERGED|id1|id2` when several sources were fused.
    pub invoice_id_full: String,
    pub iso_date: String,
    pub origin_address: String,
    pub customer_name: String,
    pub parent_company: String,
    pub sold_to_attn: String,
    pub ship_to_resolved: String,
    pub ship_to_attn: String,
    pub customer_segment: String,
    pub region: String,
    pub po: String,
    pub salesperson: String,
    pub terms: String,
    pub shipped_via: String,
    pub fob: String,
    pub printed_subtotal: f64,
    pub calculated_item_total: f64,
    pub tax: f64,
    pub shipping: f64,
    pub cc_fees: f64,
    pub intl_fees: f64,
    pub discount_line: f64,
    pub discount_invoice: f64,
    pub total: f64,
    pub currency: String,
    pub inconsistency_level: InconsistencyLevel,
    pub math_check: String,
}

impl CanonicalInvoice {
    pub fn is_merged(&self) -> bool {
        is_merged_id(&self.invoice_id_full)
    }
}

/// True if a full id carries the multi-source merge sentinel.
pub fn is_merged_id(full_id: &str) -> bool {
    full_id
        .split(MERGE_DELIMITER)
        .next()
        .is_some_and(|head| head.trim().eq_ignore_ascii_case(MERGE_SENTINEL))
}

/// Build a merged full id from contributing full ids.
pub fn merged_id<'a, I: IntoIterator<Item = &'a str>>(full_ids: I) -> String {
    let mut out = String::from(MERGE_SENTINEL);
    for id in full_ids {
        out.push(MERGE_DELIMITER);
        out.push_str(id);
    }
    out
}

/// One line of a canonical invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalLineItem {
    pub invoice_id_base: String,
    /// Product glossary reference as returned, even when it did not resolve.
    pub prod_id: String,
    pub qty: f64,
    pub item_no: String,
    pub description: String,
    pub unit_cost: f64,
    pub extended_total: f64,
    pub category: String,
    pub product_class: String,
    pub product_line: String,
    /// Parent repair/rebuild line this row attaches to, if any.
    pub parent_description: String,
    pub sub_details: String,
}

/// Denormalized invoice x line row for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatLedgerRow {
    pub invoice_id_base: String,
    pub invoice_id_full: String,
    pub iso_date: String,
    pub customer_name: String,
    pub parent_company: String,
    pub customer_segment: String,
    pub region: String,
    pub qty: f64,
    pub item_no: String,
    pub description: String,
    pub unit_cost: f64,
    pub extended_total: f64,
    pub category: String,
    pub product_class: String,
    pub product_line: String,
    pub parent_description: String,
    pub sub_details: String,
    pub grand_total: f64,
    pub inconsistency_level: InconsistencyLevel,
}

/// Everything written for one reconciled chunk.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    pub invoices: Vec<CanonicalInvoice>,
    pub line_items: Vec<CanonicalLineItem>,
    pub flat_rows: Vec<FlatLedgerRow>,
}

impl LedgerBatch {
    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_id_round_trip() {
        let id = merged_id(["5001", "5001-A"]);
        assert_eq!(id, "MERGED|5001|5001-A");
        assert!(is_merged_id(&id));
        assert!(is_merged_id("merged|1|2"));
        assert!(!is_merged_id("5001-A"));
        assert!(!is_merged_id(""));
    }
}
