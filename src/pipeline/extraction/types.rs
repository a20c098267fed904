//! Typed response schema for a single-record extraction.

use serde::Deserialize;

use crate::models::lenient;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredExtraction {
    pub invoice_identity: InvoiceIdentity,
    #[serde(default)]
    pub billing_and_shipping: BillingAndShipping,
    #[serde(default)]
    pub order_metadata: OrderMetadata,
    pub line_items: Vec<ExtractedLineItem>,
    #[serde(default)]
    pub financials: ExtractedFinancials,
    #[serde(default)]
    pub audit: ExtractionAudit,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceIdentity {
    #[serde(default, deserialize_with = "lenient::string")]
    pub invoice_id_full: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub invoice_id_base: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub origin_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingAndShipping {
    #[serde(default, deserialize_with = "lenient::string")]
    pub sold_to: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sold_to_attn: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ship_to_raw: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ship_to: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ship_to_attn: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderMetadata {
    #[serde(default, deserialize_with = "lenient::string")]
    pub po_number: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub salesperson: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub terms: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub shipped_via: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub fob: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedLineItem {
    #[serde(default, deserialize_with = "lenient::number")]
    pub qty: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub item_no: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub unit_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub extended_total: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub line_category: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub parent_description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sub_details: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub rental_period: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedFinancials {
    #[serde(default, deserialize_with = "lenient::number")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tax: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub shipping: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub cc_fees: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub intl_doc_fees: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub discount_line: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub discount_invoice: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_amount: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub currency: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionAudit {
    #[serde(default, deserialize_with = "lenient::string")]
    pub invoice_type: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub inconsistency_level: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub inconsistency_notes: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub math_check: String,
}
