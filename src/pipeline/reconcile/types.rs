//! Typed reconciliation response.

use serde::Deserialize;

use crate::models::lenient;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconciliationResponse {
    pub winning_invoices: Vec<WinningInvoice>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub architect_insights: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WinningInvoice {
    #[serde(deserialize_with = "lenient::string")]
    pub invoice_id_full: String,
    #[serde(deserialize_with = "lenient::string")]
    pub invoice_id_base: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub iso_date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub origin_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub cust_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sold_to_attn: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ship_to_resolved: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ship_to_attn: String,
    #[serde(default)]
    pub metadata: InvoiceMetadata,
    #[serde(default)]
    pub financials: InvoiceFinancials,
    #[serde(default)]
    pub line_items: Vec<WinningLineItem>,
    #[serde(default)]
    pub audit: InvoiceAudit,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InvoiceMetadata {
    #[serde(default, deserialize_with = "lenient::string")]
    pub po: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub salesperson: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub terms: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub shipped_via: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub fob: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InvoiceFinancials {
    #[serde(default, deserialize_with = "lenient::number")]
    pub printed_subtotal: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub calculated_item_total: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tax: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub shipping: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub cc_fees: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub intl_fees: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub discount_line: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub discount_invoice: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub currency: String,
}

impl InvoiceFinancials {
    /// Field-wise sum, used when supplements are fused. The first currency wins.
    pub fn add(&mut self, other: &InvoiceFinancials) {
        self.printed_subtotal += other.printed_subtotal;
        self.calculated_item_total += other.calculated_item_total;
        self.tax += other.tax;
        self.shipping += other.shipping;
        self.cc_fees += other.cc_fees;
        self.intl_fees += other.intl_fees;
        self.discount_line += other.discount_line;
        self.discount_invoice += other.discount_invoice;
        self.total += other.total;
        if self.currency.trim().is_empty() {
            self.currency = other.currency.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WinningLineItem {
    #[serde(default, deserialize_with = "lenient::number")]
    pub qty: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub prod_id: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub extended_total: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub parent_description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sub_details: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub serviced_model_line: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InvoiceAudit {
    #[serde(default, deserialize_with = "lenient::string")]
    pub level: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub notes: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub math_check: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn winner_tolerates_loose_scalars() {
        let parsed: ReconciliationResponse = serde_json::from_value(json!({
            "winning_invoices": [{
                "invoice_id_full": 5001, "invoice_id_base": "5001",
                "metadata": {"po": null},
                "financials": {"total": "1,200.50"},
                "line_items": [{"qty": "2", "prod_id": "P1", "extended_total": 100}]
            }]
        }))
        .unwrap();
        let winner = &parsed.winning_invoices[0];
        assert_eq!(winner.invoice_id_full, "5001");
        assert_eq!(winner.metadata.po, "");
        assert_eq!(winner.financials.total, 1200.5);
        assert_eq!(winner.line_items[0].qty, 2.0);
        assert_eq!(parsed.architect_insights, "");
    }

    #[test]
    fn winner_without_base_id_is_rejected() {
        let result: Result<ReconciliationResponse, _> = serde_json::from_value(json!({
            "winning_invoices": [{"invoice_id_full": "5001"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn financials_add_sums_amounts() {
        let mut a = InvoiceFinancials {
            total: 100.0,
            tax: 5.0,
            ..Default::default()
        };
        a.add(&InvoiceFinancials {
            total: 50.0,
            currency: "USD".into(),
            ..Default::default()
        });
        assert_eq!(a.total, 150.0);
        assert_eq!(a.tax, 5.0);
        assert_eq!(a.currency, "USD");
    }
}
