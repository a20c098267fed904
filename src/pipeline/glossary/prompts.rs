pub const ORIGINS_PROMPT: &str = r#"Act as a Data Steward. Standardize the "From" (Origin) addresses found in the header logo areas.
ASSIGN SHORT IDs: Give every unique location an "origin_id" (O1, O2...).

CRITICAL: Return a deduplicated list. One row per logical origin.
YOU ARE FORBIDDEN FROM SAMPLING. Every input address must map to exactly one origin.

TASK:
1. Extract and standardize the physical address (e.g. 4051 E. La Palma Ave).
2. Note the date range this location appears to be active based on the logs.

RETURN ONLY JSON:
{
  "origins": [{"origin_id": "string", "raw_address": "string", "standardized_address": "string", "city": "string", "state": "string", "zip": "string"}],
  "self_audit": {"input_addresses": "number", "entities_created": "number"},
  "steward_observations": "string"
}"#;

pub const CUSTOMERS_PROMPT: &str = r#"Act as a Forensic Data Steward. Build the Master Customer Glossary.
ASSIGN SHORT IDs: Give every unique logical business entity a "cust_id" (C1, C2...).

CRITICAL: Return a deduplicated list. One row per logical company.
YOU ARE FORBIDDEN FROM SAMPLING. Every input address must map to exactly one customer.

TASK:
1. Standardize names (remove Inc, LP, etc).
2. Identify procurement proxies (e.g. Technical Compliance -> Raytheon).
3. Return "address_aliases": A summary string of all raw addresses matched to this entity for audit.

RETURN ONLY JSON:
{
  "customers": [{"cust_id": "string", "canonical_name": "string", "parent_company": "string", "ultimate_end_user": "string", "country": "string", "state": "string", "region": "string", "industry": "string", "type": "string", "address_aliases": "string"}],
  "self_audit": {"input_addresses": "number", "entities_created": "number"},
  "steward_observations": "string"
}"#;

pub const PRODUCTS_PROMPT: &str = r#"Act as a Product Catalog Expert. Build the Master Product Glossary.
ASSIGN SHORT IDs: Give every logical product a "prod_id" (P1, P2...).

CRITICAL: Return a deduplicated list. One row per logical product/part.
YOU ARE FORBIDDEN FROM SAMPLING. Every input item must map to exactly one product.

TASK:
1. Normalize IDs.
2. CATEGORIZE: Major Equipment, Consumable Part, Service, Training, Fee, or Gas.
3. DESCRIPTION ANALYSIS: Identify specific items like "GAS - HYDROGEN", "TRADE-IN", "Combustion air pump", "Intake filter", and "Credit card fee" by looking at descriptions.
4. TRADE-INS: Treat "TRADE-IN" as the item and move the details of what was traded to the notes.

RETURN ONLY JSON:
{
  "products": [{"prod_id": "string", "raw_item_no": "string", "raw_description": "string", "canonical_item_no": "string", "category": "string", "product_class": "string", "model_line": "string", "notes": "string"}],
  "self_audit": {"input": "number", "actual": "number"}
}"#;
