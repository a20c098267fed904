pub const RECONCILIATION_PROMPT: &str = r#"Act as a Master Systems Architect. Reconstruct the "One True Ledger".
DEDUPLICATION: Resolve which invoice version is the Winner.
REPAIRS: Keep associations for LABOR, PARTS, and TRAINING via "parent_description".
Identify the "serviced_model_line" for any service or repair job.
COMPRESSION: Use IDs (cust_id, prod_id, origin_id).

Specifically regarding de-duplication:

GOAL: Reconstruct the "One True Ledger" to ensure 100% financial accuracy for reporting.
* Versioning Logic: Reconcile base IDs and suffixes (e.g., -A, -B). Treat them as Replacements if they correct or finalize a previous entry, but as Supplements if the line items represent additional charges.
* Unique Anchors: Use Purchase Orders and Serial Numbers as physical anchors. It is physically impossible to sell the same serial number twice; use this to spot administrative duplicates.
* Financial Integrity: Identify "Progress Billing" (deposits vs. final invoices) and collapse literal file copies to prevent revenue inflation. Deposits and final invoices are distinct events.
* Mandate: Every row in the final export must represent a unique financial event or physical unit. Do not double-count revenue, but do not "over-merge" distinct transactions.

IMPORTANT: Over-merging at the invoice level is a major failure in the system!!! There must be exactly one output invoice per invoice_id_base value in the segment. If that's not exactly one-to-one, then you either under-merged or over-merged.

IMPORTANT: Over-merging at the line item level is ALSO a major failure!!! Be very careful not to over-merge line items. That will result in loss of sales in the reporting.

IMPORTANT: Most of the time, you will choose one complete "winner" among the eligible invoices. On the rare occasion that you mix from multiple, the invoice_id_full value must be the word MERGED followed by a pipe separated list of all the invoices merged from. Pipe character is |.

METADATA: If PO, Salesperson, Terms, or Shipped Via are missing, return "". DO NOT use "NOT_SPECIFIED" or similar placeholders.
FEES: Treat Credit Card Fees as line items in the "line_items" array.

CRITICAL: You are a data pipe. Output ONLY raw JSON. No preamble, no markdown backticks, and no concluding text.
Everything you wish to report MUST be a string value inside the JSON keys.

RETURN ONLY JSON IN THIS SCHEMA:
{
  "winning_invoices": [
    {
      "invoice_id_full": "string",
      "invoice_id_base": "string",
      "iso_date": "string",
      "origin_id": "string",
      "cust_id": "string",
      "sold_to_attn": "string",
      "ship_to_resolved": "string",
      "ship_to_attn": "string",
      "metadata": {
        "po": "string",
        "salesperson": "string",
        "terms": "string",
        "shipped_via": "string",
        "fob": "string"
      },
      "financials": {
        "printed_subtotal": 0,
        "calculated_item_total": 0,
        "tax": 0,
        "shipping": 0,
        "cc_fees": 0,
        "intl_fees": 0,
        "discount_line": 0,
        "discount_invoice": 0,
        "total": 0,
        "currency": "string"
      },
      "line_items": [
        {
          "qty": 0,
          "prod_id": "string",
          "extended_total": 0,
          "parent_description": "string",
          "sub_details": "string",
          "serviced_model_line": "string"
        }
      ],
      "audit": {
        "level": "NONE|MINOR|MAJOR|SEVERE",
        "notes": "string",
        "math_check": "string"
      }
    }
  ],
  "architect_insights": "string"
}"#;
