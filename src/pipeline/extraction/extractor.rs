use crate::models::enums::RenditionFormat;
use crate::models::{RawExtractionRow, SourceRecord};
use crate::pipeline::reasoning::{decode, Part, ReasoningService, PDF_MIME_TYPE};

use super::document::{render_structured_text, DocumentReader, RenditionFetcher};
use super::error::ExtractionError;
use super::prompt::{EXTRACTION_PROMPT, TEXT_VIEW_PREFIX};
use super::types::StructuredExtraction;

const MODIFIED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Extracts one source record through the reasoning service.
pub struct SingleRecordExtractor<'a> {
    reader: &'a dyn DocumentReader,
    fetcher: &'a dyn RenditionFetcher,
    service: &'a dyn ReasoningService,
}

impl<'a> SingleRecordExtractor<'a> {
    pub fn new(
        reader: &'a dyn DocumentReader,
        fetcher: &'a dyn RenditionFetcher,
        service: &'a dyn ReasoningService,
    ) -> Self {
        Self {
            reader,
            fetcher,
            service,
        }
    }

    /// Send the text view and the visual rendition in one request and return
    /// the normalized extraction.
    pub fn extract(&self, record: &SourceRecord) -> Result<StructuredExtraction, ExtractionError> {
        let structured_ref = require_rendition(record, RenditionFormat::Structured)?;
        let visual_ref = require_rendition(record, RenditionFormat::Visual)?;

        let document = self.reader.read(structured_ref)?;
        let text_view = render_structured_text(&document);
        tracing::debug!(
            record_id = %record.id,
            text_chars = text_view.len(),
            "Text view rendered"
        );

        let visual = self.fetcher.fetch(visual_ref)?;
        let parts = vec![
            Part::text(format!("{TEXT_VIEW_PREFIX}{text_view}")),
            Part::inline(PDF_MIME_TYPE, &visual),
            Part::text(EXTRACTION_PROMPT),
        ];

        let value = self.service.invoke_parts(parts, &record.name)?;
        let extraction: StructuredExtraction = decode(value, &record.name)?;
        normalize(extraction, &record.name)
    }
}

fn require_rendition(record: &SourceRecord, format: RenditionFormat) -> Result<&str, ExtractionError> {
    record
        .rendition_ref(format)
        .ok_or_else(|| ExtractionError::MissingRendition {
            id: record.id.clone(),
            format,
        })
}

/// Fill derivable gaps: the base id from the full id and blank unit costs
/// from their totals. An extraction without any invoice id is rejected.
fn normalize(
    mut extraction: StructuredExtraction,
    label: &str,
) -> Result<StructuredExtraction, ExtractionError> {
    let identity = &mut extraction.invoice_identity;
    identity.invoice_id_full = identity.invoice_id_full.trim().to_string();
    identity.invoice_id_base = identity.invoice_id_base.trim().to_string();
    if identity.invoice_id_base.is_empty() {
        identity.invoice_id_base = base_id_from_full(&identity.invoice_id_full);
    }
    if identity.invoice_id_full.is_empty() {
        identity.invoice_id_full = identity.invoice_id_base.clone();
    }
    if identity.invoice_id_base.is_empty() {
        return Err(ExtractionError::MissingIdentity(label.to_string()));
    }

    for item in &mut extraction.line_items {
        item.unit_cost = derive_unit_cost(item.qty, item.unit_cost, item.extended_total);
    }
    Ok(extraction)
}

/// Core of a full id: the leading token before a suffix such as "-A" or " A".
pub fn base_id_from_full(full_id: &str) -> String {
    full_id
        .trim()
        .split(|c: char| c == '-' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Back-compute a blank unit cost as extended total / quantity.
pub fn derive_unit_cost(qty: f64, unit_cost: Option<f64>, extended_total: Option<f64>) -> Option<f64> {
    match (unit_cost, extended_total) {
        (Some(cost), _) => Some(cost),
        (None, Some(total)) if qty > 0.0 => Some(total / qty),
        _ => None,
    }
}

/// One raw row per line item, each carrying the invoice-level fields.
pub fn flatten_rows(record: &SourceRecord, extraction: &StructuredExtraction) -> Vec<RawExtractionRow> {
    let identity = &extraction.invoice_identity;
    let billing = &extraction.billing_and_shipping;
    let order = &extraction.order_metadata;
    let fin = &extraction.financials;
    let audit = &extraction.audit;
    let modified_at = record.modified_at.format(MODIFIED_AT_FORMAT).to_string();

    extraction
        .line_items
        .iter()
        .map(|item| RawExtractionRow {
            source_file: record.name.clone(),
            modified_at: modified_at.clone(),
            invoice_id_full: identity.invoice_id_full.clone(),
            invoice_id_base: identity.invoice_id_base.clone(),
            date: identity.date.clone(),
            origin_address: identity.origin_address.clone(),
            sold_to: billing.sold_to.clone(),
            sold_to_attn: billing.sold_to_attn.clone(),
            ship_to_raw: billing.ship_to_raw.clone(),
            ship_to: billing.ship_to.clone(),
            ship_to_attn: billing.ship_to_attn.clone(),
            po_number: order.po_number.clone(),
            salesperson: order.salesperson.clone(),
            terms: order.terms.clone(),
            shipped_via: order.shipped_via.clone(),
            fob: order.fob.clone(),
            qty: item.qty,
            item_no: item.item_no.clone(),
            description: item.description.clone(),
            unit_cost: item.unit_cost,
            extended_total: item.extended_total,
            line_category: item.line_category.clone(),
            parent_description: item.parent_description.clone(),
            sub_details: item.sub_details.clone(),
            rental_period: item.rental_period.clone(),
            subtotal: fin.subtotal,
            tax: fin.tax,
            shipping: fin.shipping,
            cc_fees: fin.cc_fees,
            intl_fees: fin.intl_doc_fees,
            discount_line: fin.discount_line,
            discount_invoice: fin.discount_invoice,
            grand_total: fin.total_amount,
            currency: fin.currency.clone(),
            invoice_type: audit.invoice_type.clone(),
            inconsistency_level: audit.inconsistency_level.clone(),
            inconsistency_notes: audit.inconsistency_notes.clone(),
            math_check: audit.math_check.clone(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::enums::ProcessingStatus;
    use crate::pipeline::extraction::document::{Block, StructuredDocument};
    use crate::pipeline::reasoning::ScriptedService;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    pub struct FixedReader(pub StructuredDocument);

    impl DocumentReader for FixedReader {
        fn read(&self, _reference: &str) -> Result<StructuredDocument, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    pub struct FixedFetcher;

    impl RenditionFetcher for FixedFetcher {
        fn fetch(&self, _reference: &str) -> Result<Vec<u8>, ExtractionError> {
            Ok(b"%PDF-1.4".to_vec())
        }
    }

    pub fn converted_record(id: &str, position: i64) -> SourceRecord {
        SourceRecord {
            position,
            id: id.into(),
            name: format!("{id}.doc"),
            modified_at: NaiveDate::from_ymd_opt(2022, 3, 14)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            conversion_status: ProcessingStatus::Succeeded,
            structured_ref: Some(format!("structured/{id}.html")),
            markup_ref: Some(format!("markup/{id}.html")),
            visual_ref: Some(format!("visual/{id}.pdf")),
            extraction_status: ProcessingStatus::NotStarted,
        }
    }

    pub fn extraction_response(full_id: &str, base_id: &str) -> Value {
        json!({
            "invoice_identity": {
                "invoice_id_full": full_id,
                "invoice_id_base": base_id,
                "date": "03/14/2022",
                "origin_address": "1 Main St, Houston TX"
            },
            "billing_and_shipping": {
                "sold_to": "Acme Drilling, 5 Rig Rd",
                "sold_to_attn": "J. Smith",
                "ship_to_raw": "SAME",
                "ship_to": "Acme Drilling, 5 Rig Rd",
                "ship_to_attn": ""
            },
            "order_metadata": {"po_number": "PO-77", "salesperson": "JR", "terms": "Net 30",
                               "shipped_via": "UPS", "fob": "Origin"},
            "line_items": [
                {"qty": 4, "item_no": "GH-100", "description": "Gear housing",
                 "unit_cost": "", "extended_total": 100, "line_category": "Part",
                 "parent_description": "", "sub_details": "S/N 8812", "rental_period": ""},
                {"qty": 1, "item_no": "", "description": "Labor", "unit_cost": 80,
                 "extended_total": 80, "line_category": "Labor",
                 "parent_description": "Rebuild gearbox", "sub_details": "", "rental_period": ""}
            ],
            "financials": {"subtotal": 180, "tax": "14.85", "shipping": 0, "cc_fees": 0,
                           "intl_doc_fees": 0, "discount_line": 0, "discount_invoice": 0,
                           "total_amount": 194.85, "currency": "USD"},
            "audit": {"invoice_type": "Repair", "inconsistency_level": "NONE",
                      "inconsistency_notes": "", "math_check": "180 + 14.85 = 194.85"}
        })
    }

    fn sample_document() -> StructuredDocument {
        StructuredDocument {
            header: vec![Block::Paragraph("ACME GEAR WORKS".into())],
            body: vec![Block::Table(vec![vec!["4".into(), "GH-100".into(), "100.00".into()]])],
            footer: vec![],
        }
    }

    #[test]
    fn unit_cost_back_computed_from_total() {
        assert_eq!(derive_unit_cost(4.0, None, Some(100.0)), Some(25.0));
        assert_eq!(derive_unit_cost(4.0, Some(30.0), Some(100.0)), Some(30.0));
        assert_eq!(derive_unit_cost(0.0, None, Some(100.0)), None);
        assert_eq!(derive_unit_cost(2.0, None, None), None);
    }

    #[test]
    fn base_id_strips_suffix() {
        assert_eq!(base_id_from_full("5001-A"), "5001");
        assert_eq!(base_id_from_full(" 5001 A "), "5001");
        assert_eq!(base_id_from_full("5001"), "5001");
        assert_eq!(base_id_from_full(""), "");
    }

    #[test]
    fn extract_sends_text_view_visual_and_prompt() {
        let reader = FixedReader(sample_document());
        let service = ScriptedService::new().with_response(extraction_response("5001-A", "5001"));
        let extractor = SingleRecordExtractor::new(&reader, &FixedFetcher, &service);

        let extraction = extractor.extract(&converted_record("doc-1", 1)).unwrap();
        assert_eq!(extraction.line_items[0].unit_cost, Some(25.0));
        assert_eq!(extraction.financials.tax, 14.85);

        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].inline_parts, 1);
        assert!(calls[0].text.starts_with("INVOICE STRUCTURED TEXT VIEW:\nACME GEAR WORKS\n"));
        assert!(calls[0].text.contains("[ 4 ] [ GH-100 ] [ 100.00 ] "));
        assert!(calls[0].text.contains("forensic accounting parser"));
    }

    #[test]
    fn missing_visual_rendition_fails_before_call() {
        let reader = FixedReader(sample_document());
        let service = ScriptedService::new();
        let extractor = SingleRecordExtractor::new(&reader, &FixedFetcher, &service);

        let mut record = converted_record("doc-1", 1);
        record.visual_ref = None;
        let err = extractor.extract(&record).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::MissingRendition {
                format: RenditionFormat::Visual,
                ..
            }
        ));
        assert!(service.calls().is_empty());
    }

    #[test]
    fn missing_ids_are_rejected_and_base_is_derived() {
        let reader = FixedReader(sample_document());
        let service = ScriptedService::new()
            .with_response(extraction_response("5002-B", ""))
            .with_response(extraction_response("", ""));
        let extractor = SingleRecordExtractor::new(&reader, &FixedFetcher, &service);
        let record = converted_record("doc-1", 1);

        let derived = extractor.extract(&record).unwrap();
        assert_eq!(derived.invoice_identity.invoice_id_base, "5002");

        let err = extractor.extract(&record).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingIdentity(_)));
    }

    #[test]
    fn flatten_makes_one_row_per_line_item() {
        let record = converted_record("doc-1", 1);
        let extraction: StructuredExtraction =
            serde_json::from_value(extraction_response("5001-A", "5001")).unwrap();
        let extraction = normalize(extraction, "doc-1").unwrap();

        let rows = flatten_rows(&record, &extraction);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.invoice_id_base == "5001" && r.po_number == "PO-77"));
        assert_eq!(rows[0].modified_at, "2022-03-14 10:30:00");
        assert_eq!(rows[0].sub_details, "S/N 8812");
        assert_eq!(rows[1].parent_description, "Rebuild gearbox");
        assert_eq!(rows[1].grand_total, 194.85);
    }
}
