//! Master-glossary passes.
//!
//! Each pass collects the distinct raw values for one dimension, asks the
//! reasoning service for a deduplicated catalog with short ids, validates
//! the answer and replaces the stored glossary in one transaction.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::db::repository::{replace_customers, replace_origins, replace_products};
use crate::models::enums::GlossaryDimension;
use crate::models::{CustomerEntry, OriginEntry, ProductEntry, RawExtractionRow};
use crate::pipeline::reasoning::{decode, get_case_insensitive, ReasoningError, ReasoningService};

use super::error::GlossaryError;
use super::prompts::{CUSTOMERS_PROMPT, ORIGINS_PROMPT, PRODUCTS_PROMPT};

/// Result of one glossary pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryPass {
    pub dimension: GlossaryDimension,
    pub inputs: usize,
    pub entities: usize,
    /// True when there was nothing to catalog and the stored glossary was kept.
    pub skipped: bool,
}

/// Product input as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInput {
    pub item: String,
    pub desc: String,
}

fn distinct_by<'a, F>(rows: &'a [RawExtractionRow], field: F) -> Vec<String>
where
    F: Fn(&'a RawExtractionRow) -> &'a str,
{
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| field(r).trim())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Distinct origin addresses in first-seen order.
pub fn distinct_origins(rows: &[RawExtractionRow]) -> Vec<String> {
    distinct_by(rows, |r| r.origin_address.as_str())
}

/// Distinct billing ("Sold To") addresses in first-seen order.
pub fn distinct_customers(rows: &[RawExtractionRow]) -> Vec<String> {
    distinct_by(rows, |r| r.sold_to.as_str())
}

/// Distinct item number + description pairs in first-seen order.
pub fn distinct_products(rows: &[RawExtractionRow]) -> Vec<ProductInput> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        let item = row.item_no.trim();
        let desc = row.description.trim();
        if item.is_empty() && desc.is_empty() {
            continue;
        }
        if seen.insert((item, desc)) {
            out.push(ProductInput {
                item: item.to_string(),
                desc: desc.to_string(),
            });
        }
    }
    out
}

pub fn build_master_origins(
    conn: &Connection,
    service: &dyn ReasoningService,
    rows: &[RawExtractionRow],
    allow_divergence: bool,
) -> Result<GlossaryPass, GlossaryError> {
    let inputs = distinct_origins(rows);
    let pass = PassPlan {
        dimension: GlossaryDimension::Origin,
        prompt: ORIGINS_PROMPT,
        response_key: "origins",
        label: "Unique Origins",
        allow_divergence,
    };
    match pass.request::<_, OriginEntry>(service, &inputs, |e| &e.origin_id)? {
        Some(entries) => {
            replace_origins(conn, &entries)?;
            Ok(pass.report(inputs.len(), entries.len()))
        }
        None => Ok(pass.skipped()),
    }
}

pub fn build_master_customers(
    conn: &Connection,
    service: &dyn ReasoningService,
    rows: &[RawExtractionRow],
    allow_divergence: bool,
) -> Result<GlossaryPass, GlossaryError> {
    let inputs = distinct_customers(rows);
    let pass = PassPlan {
        dimension: GlossaryDimension::Customer,
        prompt: CUSTOMERS_PROMPT,
        response_key: "customers",
        label: "Unique Customers",
        allow_divergence,
    };
    match pass.request::<_, CustomerEntry>(service, &inputs, |e| &e.cust_id)? {
        Some(entries) => {
            replace_customers(conn, &entries)?;
            Ok(pass.report(inputs.len(), entries.len()))
        }
        None => Ok(pass.skipped()),
    }
}

pub fn build_master_products(
    conn: &Connection,
    service: &dyn ReasoningService,
    rows: &[RawExtractionRow],
    allow_divergence: bool,
) -> Result<GlossaryPass, GlossaryError> {
    let inputs = distinct_products(rows);
    let pass = PassPlan {
        dimension: GlossaryDimension::Product,
        prompt: PRODUCTS_PROMPT,
        response_key: "products",
        label: "Unique Items",
        allow_divergence,
    };
    match pass.request::<_, ProductEntry>(service, &inputs, |e| &e.prod_id)? {
        Some(entries) => {
            replace_products(conn, &entries)?;
            Ok(pass.report(inputs.len(), entries.len()))
        }
        None => Ok(pass.skipped()),
    }
}

struct PassPlan {
    dimension: GlossaryDimension,
    prompt: &'static str,
    response_key: &'static str,
    label: &'static str,
    allow_divergence: bool,
}

impl PassPlan {
    /// Ask for the glossary and validate it. `None` means there was no input.
    fn request<I, T>(
        &self,
        service: &dyn ReasoningService,
        inputs: &[I],
        id_of: fn(&T) -> &String,
    ) -> Result<Option<Vec<T>>, GlossaryError>
    where
        I: Serialize,
        T: DeserializeOwned,
    {
        let _span = tracing::info_span!("glossary_pass", dimension = %self.dimension).entered();
        if inputs.is_empty() {
            tracing::warn!("No distinct inputs, keeping existing glossary");
            return Ok(None);
        }

        let label = format!("{}: {}", self.label, inputs.len());
        let payload = serde_json::to_value(inputs)
            .map_err(|e| ReasoningError::ResponseParsing(format!("payload encode: {e}")))?;
        let response = service.invoke(self.prompt, &payload, &label)?;
        let array = get_case_insensitive(&response, self.response_key)
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let entries: Vec<T> = decode(array, &label)?;

        self.check_ids(entries.iter().map(id_of))?;
        self.check_cardinality(inputs.len(), entries.len())?;

        tracing::info!(inputs = inputs.len(), entities = entries.len(), "Glossary built");
        Ok(Some(entries))
    }

    fn check_ids<'a>(&self, ids: impl Iterator<Item = &'a String>) -> Result<(), GlossaryError> {
        let mut seen = HashSet::new();
        for id in ids {
            let id = id.trim();
            if id.is_empty() {
                return Err(GlossaryError::InvalidIds {
                    dimension: self.dimension,
                    reason: "entry without id".into(),
                });
            }
            if !seen.insert(id) {
                return Err(GlossaryError::InvalidIds {
                    dimension: self.dimension,
                    reason: format!("duplicate id {id}"),
                });
            }
        }
        Ok(())
    }

    /// A catalog far smaller than its input, or larger than it, means the
    /// service sampled or invented entries.
    fn check_cardinality(&self, inputs: usize, entities: usize) -> Result<(), GlossaryError> {
        let diverges = entities.saturating_mul(4) < inputs || entities > inputs;
        if !diverges {
            return Ok(());
        }
        if self.allow_divergence {
            tracing::warn!(inputs, entities, "Glossary cardinality diverges, accepted by override");
            return Ok(());
        }
        tracing::error!(inputs, entities, "Glossary cardinality diverges");
        Err(GlossaryError::Incomplete {
            dimension: self.dimension,
            inputs,
            entities,
        })
    }

    fn report(&self, inputs: usize, entities: usize) -> GlossaryPass {
        GlossaryPass {
            dimension: self.dimension,
            inputs,
            entities,
            skipped: false,
        }
    }

    fn skipped(&self) -> GlossaryPass {
        GlossaryPass {
            dimension: self.dimension,
            inputs: 0,
            entities: 0,
            skipped: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::load_glossaries;
    use crate::db::sqlite::open_memory_database;
    use crate::pipeline::reasoning::ScriptedService;
    use serde_json::json;

    fn row(origin: &str, sold_to: &str, item: &str, desc: &str) -> RawExtractionRow {
        RawExtractionRow {
            origin_address: origin.into(),
            sold_to: sold_to.into(),
            item_no: item.into(),
            description: desc.into(),
            ..Default::default()
        }
    }

    fn rows() -> Vec<RawExtractionRow> {
        vec![
            row("4051 E. La Palma Ave", "Acme Inc, 1 Main St", "GH-100", "Generator"),
            row("4051 E La Palma", "ACME, 1 Main Street", "GH-100", "Generator"),
            row("4051 E. La Palma Ave", "Acme Inc, 1 Main St", "", "Credit card fee"),
            row("", "  ", "GH-100", "Generator"),
        ]
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let rows = rows();
        assert_eq!(
            distinct_origins(&rows),
            vec!["4051 E. La Palma Ave", "4051 E La Palma"]
        );
        assert_eq!(
            distinct_customers(&rows),
            vec!["Acme Inc, 1 Main St", "ACME, 1 Main Street"]
        );
        let products = distinct_products(&rows);
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].desc, "Credit card fee");
    }

    #[test]
    fn origins_pass_persists_catalog() {
        let conn = open_memory_database().unwrap();
        let service = ScriptedService::new().with_response(json!({
            "Origins": [{"origin_id": "O1", "raw_address": "4051 E. La Palma Ave",
                         "standardized_address": "4051 E. La Palma Ave", "zip": 92807}],
            "self_audit": {"input_addresses": 2, "entities_created": 1}
        }));

        let pass = build_master_origins(&conn, &service, &rows(), false).unwrap();
        assert_eq!((pass.inputs, pass.entities, pass.skipped), (2, 1, false));

        let calls = service.calls();
        assert_eq!(calls[0].label, "Unique Origins: 2");
        assert!(calls[0].text.contains("FORBIDDEN FROM SAMPLING"));
        assert!(calls[0].text.contains("4051 E La Palma"));

        let glossaries = load_glossaries(&conn).unwrap();
        assert_eq!(glossaries.origins["O1"].zip, "92807");
    }

    #[test]
    fn customer_type_field_maps_to_entity_type() {
        let conn = open_memory_database().unwrap();
        let service = ScriptedService::new().with_response(json!({
            "customers": [{"cust_id": "C1", "canonical_name": "Acme", "type": "Direct",
                           "industry": "Aerospace"}]
        }));
        build_master_customers(&conn, &service, &rows(), false).unwrap();
        let glossaries = load_glossaries(&conn).unwrap();
        assert_eq!(glossaries.customers["C1"].entity_type, "Direct");
        assert_eq!(glossaries.customers["C1"].parent_company, "");
    }

    #[test]
    fn oversized_catalog_is_incomplete() {
        let conn = open_memory_database().unwrap();
        let service = ScriptedService::new().with_response(json!({
            "products": [
                {"prod_id": "P1"}, {"prod_id": "P2"}, {"prod_id": "P3"}
            ]
        }));
        let err = build_master_products(&conn, &service, &rows(), false).unwrap_err();
        assert!(matches!(
            err,
            GlossaryError::Incomplete {
                dimension: GlossaryDimension::Product,
                inputs: 2,
                entities: 3
            }
        ));
        assert!(load_glossaries(&conn).unwrap().products.is_empty());
    }

    #[test]
    fn sampled_catalog_is_incomplete_unless_overridden() {
        let many: Vec<RawExtractionRow> = (0..10)
            .map(|i| row(&format!("{i} Main St"), "x", "i", "d"))
            .collect();
        let response = json!({"origins": [{"origin_id": "O1"}, {"origin_id": "O2"}]});

        let conn = open_memory_database().unwrap();
        let strict = ScriptedService::new().with_response(response.clone());
        let err = build_master_origins(&conn, &strict, &many, false).unwrap_err();
        assert!(matches!(err, GlossaryError::Incomplete { inputs: 10, entities: 2, .. }));

        let lenient = ScriptedService::new().with_response(response);
        let pass = build_master_origins(&conn, &lenient, &many, true).unwrap();
        assert_eq!(pass.entities, 2);
        assert_eq!(load_glossaries(&conn).unwrap().origins.len(), 2);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let conn = open_memory_database().unwrap();
        let service = ScriptedService::new().with_response(json!({
            "origins": [{"origin_id": "O1"}, {"origin_id": " O1 "}]
        }));
        let err = build_master_origins(&conn, &service, &rows(), false).unwrap_err();
        assert!(matches!(err, GlossaryError::InvalidIds { .. }));
    }

    #[test]
    fn entry_without_id_is_schema_mismatch() {
        let conn = open_memory_database().unwrap();
        let service = ScriptedService::new()
            .with_response(json!({"origins": [{"raw_address": "somewhere"}]}));
        let err = build_master_origins(&conn, &service, &rows(), false).unwrap_err();
        assert!(matches!(
            err,
            GlossaryError::Reasoning(ReasoningError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn empty_input_keeps_previous_glossary() {
        let conn = open_memory_database().unwrap();
        let seed = ScriptedService::new().with_response(json!({
            "customers": [{"cust_id": "C1", "canonical_name": "Acme"}]
        }));
        build_master_customers(&conn, &seed, &rows(), false).unwrap();

        let untouched = ScriptedService::new();
        let pass = build_master_customers(&conn, &untouched, &[], false).unwrap();
        assert!(pass.skipped);
        assert!(untouched.calls().is_empty());
        assert_eq!(load_glossaries(&conn).unwrap().customers.len(), 1);
    }

    #[test]
    fn service_failure_propagates_and_keeps_table() {
        let conn = open_memory_database().unwrap();
        let service = ScriptedService::new().with_error(ReasoningError::RetriesExhausted {
            attempts: 3,
            last_status: 429,
        });
        let err = build_master_products(&conn, &service, &rows(), false).unwrap_err();
        assert!(matches!(err, GlossaryError::Reasoning(_)));
    }
}
