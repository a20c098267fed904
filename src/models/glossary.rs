use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lenient;

/// Canonical business location (the "From" block of an invoice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub origin_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub raw_address: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub standardized_address: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub zip: String,
}

/// Canonical customer entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub cust_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub canonical_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub parent_company: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ultimate_end_user: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub region: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub industry: String,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub entity_type: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub address_aliases: String,
}

/// Canonical product, part, service or fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub prod_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub raw_item_no: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub raw_description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub canonical_item_no: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub product_class: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub model_line: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub notes: String,
}

/// All three glossaries, keyed by short identifier. Loaded once per
/// reconciliation run and used read-only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Glossaries {
    pub origins: BTreeMap<String, OriginEntry>,
    pub customers: BTreeMap<String, CustomerEntry>,
    pub products: BTreeMap<String, ProductEntry>,
}

impl Glossaries {
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty() && self.customers.is_empty() && self.products.is_empty()
    }
}
