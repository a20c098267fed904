//! Turn a winning invoice into ledger rows, resolving glossary ids.

use crate::models::enums::InconsistencyLevel;
use crate::models::{
    CanonicalInvoice, CanonicalLineItem, FlatLedgerRow, Glossaries, LedgerBatch, UNKNOWN, UNMAPPED,
};

use super::types::WinningInvoice;

const DEFAULT_CURRENCY: &str = "USD";

fn or_marker(value: Option<&String>, marker: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => marker.to_string(),
    }
}

fn or_empty(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}

/// Append the invoice, its line items and the flat rows for one winner.
///
/// `base_id` is the chunk's base id the winner was matched to. `fallback_date`
/// is used when the winner carries no date.
pub fn append_winner(
    batch: &mut LedgerBatch,
    winner: &WinningInvoice,
    base_id: &str,
    fallback_date: &str,
    glossaries: &Glossaries,
) {
    let origin = glossaries.origins.get(winner.origin_id.trim());
    let customer = glossaries.customers.get(winner.cust_id.trim());
    if customer.is_none() {
        tracing::warn!(base_id, cust_id = %winner.cust_id, "Customer id not in glossary");
    }

    let iso_date = if winner.iso_date.trim().is_empty() {
        fallback_date.to_string()
    } else {
        winner.iso_date.trim().to_string()
    };
    let currency = if winner.financials.currency.trim().is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        winner.financials.currency.clone()
    };
    let level = InconsistencyLevel::from_loose(&winner.audit.level);

    let invoice = CanonicalInvoice {
        invoice_id_base: base_id.to_string(),
        invoice_id_full: winner.invoice_id_full.trim().to_string(),
        iso_date,
        origin_address: or_empty(origin.map(|o| &o.standardized_address)),
        customer_name: or_marker(customer.map(|c| &c.canonical_name), UNMAPPED),
        parent_company: or_empty(customer.map(|c| &c.parent_company)),
        sold_to_attn: winner.sold_to_attn.clone(),
        ship_to_resolved: winner.ship_to_resolved.clone(),
        ship_to_attn: winner.ship_to_attn.clone(),
        customer_segment: or_empty(customer.map(|c| &c.industry)),
        region: or_empty(customer.map(|c| &c.region)),
        po: winner.metadata.po.clone(),
        salesperson: winner.metadata.salesperson.clone(),
        terms: winner.metadata.terms.clone(),
        shipped_via: winner.metadata.shipped_via.clone(),
        fob: winner.metadata.fob.clone(),
        printed_subtotal: winner.financials.printed_subtotal,
        calculated_item_total: winner.financials.calculated_item_total,
        tax: winner.financials.tax,
        shipping: winner.financials.shipping,
        cc_fees: winner.financials.cc_fees,
        intl_fees: winner.financials.intl_fees,
        discount_line: winner.financials.discount_line,
        discount_invoice: winner.financials.discount_invoice,
        total: winner.financials.total,
        currency,
        inconsistency_level: level,
        math_check: winner.audit.math_check.clone(),
    };

    for item in &winner.line_items {
        let product = glossaries.products.get(item.prod_id.trim());
        let unit_cost = if item.qty > 0.0 {
            item.extended_total / item.qty
        } else {
            0.0
        };
        let product_line = if item.serviced_model_line.trim().is_empty() {
            or_empty(product.map(|p| &p.model_line))
        } else {
            item.serviced_model_line.clone()
        };

        let line = CanonicalLineItem {
            invoice_id_base: base_id.to_string(),
            prod_id: item.prod_id.trim().to_string(),
            qty: item.qty,
            item_no: or_marker(product.map(|p| &p.canonical_item_no), UNKNOWN),
            description: or_marker(product.map(|p| &p.raw_description), UNKNOWN),
            unit_cost,
            extended_total: item.extended_total,
            category: or_empty(product.map(|p| &p.category)),
            product_class: or_empty(product.map(|p| &p.product_class)),
            product_line,
            parent_description: item.parent_description.clone(),
            sub_details: item.sub_details.clone(),
        };

        batch.flat_rows.push(FlatLedgerRow {
            invoice_id_base: base_id.to_string(),
            invoice_id_full: invoice.invoice_id_full.clone(),
            iso_date: invoice.iso_date.clone(),
            customer_name: invoice.customer_name.clone(),
            parent_company: invoice.parent_company.clone(),
            customer_segment: invoice.customer_segment.clone(),
            region: invoice.region.clone(),
            qty: line.qty,
            item_no: line.item_no.clone(),
            description: line.description.clone(),
            unit_cost: line.unit_cost,
            extended_total: line.extended_total,
            category: line.category.clone(),
            product_class: line.product_class.clone(),
            product_line: line.product_line.clone(),
            parent_description: line.parent_description.clone(),
            sub_details: line.sub_details.clone(),
            grand_total: invoice.total,
            inconsistency_level: level,
        });
        batch.line_items.push(line);
    }
    batch.invoices.push(invoice);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerEntry, OriginEntry, ProductEntry};
    use crate::pipeline::reconcile::types::WinningLineItem;

    fn glossaries() -> Glossaries {
        let mut g = Glossaries::default();
        g.origins.insert(
            "O1".into(),
            OriginEntry {
                origin_id: "O1".into(),
                raw_address: "4051 E La Palma".into(),
                standardized_address: "4051 E. La Palma Ave".into(),
                city: "Anaheim".into(),
                state: "CA".into(),
                zip: "92807".into(),
            },
        );
        g.customers.insert(
            "C1".into(),
            CustomerEntry {
                cust_id: "C1".into(),
                canonical_name: "Acme".into(),
                parent_company: "Acme Holdings".into(),
                ultimate_end_user: String::new(),
                country: "US".into(),
                state: "CA".into(),
                region: "West".into(),
                industry: "Aerospace".into(),
                entity_type: "Direct".into(),
                address_aliases: String::new(),
            },
        );
        g.products.insert(
            "P1".into(),
            ProductEntry {
                prod_id: "P1".into(),
                raw_item_no: "gh100".into(),
                raw_description: "Generator".into(),
                canonical_item_no: "GH-100".into(),
                category: "Major Equipment".into(),
                product_class: "Generator".into(),
                model_line: "GH".into(),
                notes: String::new(),
            },
        );
        g
    }

    fn winner(cust: &str, lines: Vec<WinningLineItem>) -> WinningInvoice {
        WinningInvoice {
            invoice_id_full: "5001-A".into(),
            invoice_id_base: "5001".into(),
            iso_date: "2023-02-01".into(),
            origin_id: "O1".into(),
            cust_id: cust.into(),
            line_items: lines,
            ..Default::default()
        }
    }

    #[test]
    fn resolves_known_ids() {
        let mut batch = LedgerBatch::default();
        let item = WinningLineItem {
            qty: 4.0,
            prod_id: "P1".into(),
            extended_total: 100.0,
            ..Default::default()
        };
        append_winner(&mut batch, &winner("C1", vec![item]), "5001", "", &glossaries());

        let inv = &batch.invoices[0];
        assert_eq!(inv.origin_address, "4051 E. La Palma Ave");
        assert_eq!(inv.customer_name, "Acme");
        assert_eq!(inv.customer_segment, "Aerospace");
        assert_eq!(inv.currency, "USD");
        assert_eq!(inv.inconsistency_level, InconsistencyLevel::None);

        let line = &batch.line_items[0];
        assert_eq!(line.prod_id, "P1");
        assert_eq!(line.item_no, "GH-100");
        assert_eq!(line.unit_cost, 25.0);
        assert_eq!(line.product_line, "GH");
        assert_eq!(batch.flat_rows[0].customer_name, "Acme");
    }

    #[test]
    fn unknown_ids_get_markers() {
        let mut batch = LedgerBatch::default();
        let item = WinningLineItem {
            qty: 0.0,
            prod_id: "P404".into(),
            extended_total: 30.0,
            serviced_model_line: "H2 Series".into(),
            ..Default::default()
        };
        let mut w = winner("C404", vec![item]);
        w.origin_id.clear();
        w.iso_date.clear();
        append_winner(&mut batch, &w, "5001", "2023-01-31", &glossaries());

        let inv = &batch.invoices[0];
        assert_eq!(inv.customer_name, UNMAPPED);
        assert_eq!(inv.origin_address, "");
        assert_eq!(inv.iso_date, "2023-01-31");

        let line = &batch.line_items[0];
        assert_eq!(line.prod_id, "P404");
        assert_eq!(line.item_no, UNKNOWN);
        assert_eq!(line.description, UNKNOWN);
        assert_eq!(line.unit_cost, 0.0);
        assert_eq!(line.product_line, "H2 Series");
    }
}
