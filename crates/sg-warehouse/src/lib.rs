//! sg-warehouse: Warehouse collaborators behind narrow traits.
//!
//! Pipelines only see [`WarehouseConnector`], [`WarehouseSession`] and
//! [`MetadataCatalog`]. Concrete clients talk to Snowflake and BigQuery over
//! their REST endpoints; [`scripted`] provides an in-memory stand-in.

pub mod bigquery;
pub mod catalog;
pub mod scripted;
pub mod snowflake;

use async_trait::async_trait;
use sg_core::request::SnowflakeCredentials;
use sg_core::result::ResultSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("statement failed: {0}")]
    Statement(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

// ---------------------------------------------------------------------------
// Statement
// ---------------------------------------------------------------------------

/// Statement text plus positional (`?`) text bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub bindings: Vec<String>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.bindings.push(value.into());
        self
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open warehouse session.
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, WarehouseError>;

    /// Release server-side resources. Sessions that hold none keep the default.
    async fn close(&self) -> Result<(), WarehouseError> {
        Ok(())
    }
}

/// Opens a fresh session per request.
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &SnowflakeCredentials,
    ) -> Result<Box<dyn WarehouseSession>, WarehouseError>;
}

/// Dataset / table / column enumeration.
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    async fn list_datasets(&self) -> Result<Vec<String>, WarehouseError>;
    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>, WarehouseError>;
    async fn list_columns(&self, dataset: &str, table: &str)
        -> Result<Vec<String>, WarehouseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_builder_keeps_binding_order() {
        let stmt = Statement::new("SELECT 1 WHERE a = ? AND b = ?")
            .bind("x")
            .bind("y");
        assert_eq!(stmt.bindings, vec!["x", "y"]);
        assert_eq!(Statement::from("SELECT 1").bindings.len(), 0);
    }
}
