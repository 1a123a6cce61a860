//! sg-core: Shared types for Snowgate
//!
//! This crate has zero internal crate dependencies and defines the
//! canonical types used across all other sg-* crates.

pub mod catalog;
pub mod mapping;
pub mod request;
pub mod result;
pub mod retry;
pub mod validation;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::catalog::{CatalogTable, SchemaCatalog};
    pub use crate::mapping::MappingConfig;
    pub use crate::request::{Destination, SnowflakeCredentials, SourceTable, TransferRequest};
    pub use crate::result::{QueryResult, ResultSet};
    pub use crate::retry::RetryPolicy;
    pub use crate::validation::{FieldIssue, ValidationError};
}
