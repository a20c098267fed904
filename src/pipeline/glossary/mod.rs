pub mod builder;
pub mod error;
pub mod prompts;

pub use builder::{
    build_master_customers, build_master_origins, build_master_products, distinct_customers,
    distinct_origins, distinct_products, GlossaryPass, ProductInput,
};
pub use error::GlossaryError;
