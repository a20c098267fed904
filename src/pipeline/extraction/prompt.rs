/// Prefix of the text-view part of an extraction request.
pub const TEXT_VIEW_PREFIX: &str = "INVOICE STRUCTURED TEXT VIEW:\n";

/// Instructions for turning one invoice (text view + visual rendition) into
/// the expanded extraction schema.
pub const EXTRACTION_PROMPT: &str = r#"Act as a forensic accounting parser. I am providing a digital text representation and a visual PDF of the same invoice.
Extract every piece of metadata into an expanded JSON format following these STRICT business rules:

1. IDENTITY:
   - "invoice_id_full": Exactly as written.
   - "invoice_id_base": Numeric core only (strip suffixes like "- A").
   - "date": The invoice date exactly as printed.
   - "origin_address": Full address from the header logical block.

2. ADDRESS AND CONTACT RESOLUTION:
   - "sold_to": The billing address found in the "Sold To" address block.
   - "sold_to_attn": Contact name from "Attn:" or "Attention:" lines within the "Sold To" block. Be flexible with labels.
   - "ship_to_raw": Exactly what is written in the shipping area (e.g. "SAME").
   - "ship_to": If ship_to_raw is "SAME", copy the sold_to address here. Otherwise, extract the address from the "Ship To" block.
   - "ship_to_attn": Contact name from "Attn:" or "Attention:" lines within the "Ship To" block. Be flexible with labels.

3. LINE ITEM HIERARCHY:
   - "Repair/Rebuild": If a row has a description but no price, treat it as a Parent. Link the following "Parts" or "Labor" rows as children via "parent_description".
   - "Rental": Extract the period (weeks/days) into "rental_period".
   - "Back-Calculate": If "unit_cost" is blank but "extended_total" exists, calculate (extended_total / qty).
   - "Sub-Details": Attach serial numbers (S/N) or notes to the "sub_details" field of the line item.
   - IGNORE rows containing only "THANK YOU".

4. GLOBAL FINANCIALS:
   - Sink mid-table fees (Tax, CC Fee, Shipping, Intl Doc Fees) into the global financial fields. They are never line items.
   - Distinguish line discounts from invoice-wide discounts.

5. AUDIT & CONSISTENCY:
   - "inconsistency_level": NONE, MINOR, MAJOR, or SEVERE.
   - "inconsistency_notes": Detailed explanation of math errors or missing critical IDs.
   - "math_check": Show the subtotal + fees - discounts = total verification.

RETURN ONLY FULLY EXPANDED JSON IN THIS SCHEMA:
{
  "invoice_identity": {
    "invoice_id_full": "string",
    "invoice_id_base": "string",
    "date": "string",
    "origin_address": "string"
  },
  "billing_and_shipping": {
    "sold_to": "string",
    "sold_to_attn": "string",
    "ship_to_raw": "string",
    "ship_to": "string",
    "ship_to_attn": "string"
  },
  "order_metadata": {
    "po_number": "string",
    "salesperson": "string",
    "terms": "string",
    "shipped_via": "string",
    "fob": "string"
  },
  "line_items": [
    {
      "qty": "number",
      "item_no": "string",
      "description": "string",
      "unit_cost": "number",
      "extended_total": "number",
      "line_category": "string",
      "parent_description": "string",
      "sub_details": "string",
      "rental_period": "string"
    }
  ],
  "financials": {
    "subtotal": "number",
    "tax": "number",
    "shipping": "number",
    "cc_fees": "number",
    "intl_doc_fees": "number",
    "discount_line": "number",
    "discount_invoice": "number",
    "total_amount": "number",
    "currency": "string"
  },
  "audit": {
    "invoice_type": "string",
    "inconsistency_level": "string",
    "inconsistency_notes": "string",
    "math_check": "string"
  }
}"#;
