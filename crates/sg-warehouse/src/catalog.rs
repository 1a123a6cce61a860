//! Snowflake metadata catalog over `INFORMATION_SCHEMA`.
//!
//! Datasets map to schemas of the session's current database.

use crate::{MetadataCatalog, Statement, WarehouseError, WarehouseSession};
use async_trait::async_trait;

const LIST_SCHEMAS: &str = "SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA \
     WHERE SCHEMA_NAME <> 'INFORMATION_SCHEMA' ORDER BY SCHEMA_NAME";
const LIST_TABLES: &str = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = ? ORDER BY TABLE_NAME";
const LIST_COLUMNS: &str = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

/// Borrowing catalog view of an open session.
pub struct SnowflakeCatalog<'a> {
    session: &'a dyn WarehouseSession,
}

impl<'a> SnowflakeCatalog<'a> {
    pub fn new(session: &'a dyn WarehouseSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl MetadataCatalog for SnowflakeCatalog<'_> {
    async fn list_datasets(&self) -> Result<Vec<String>, WarehouseError> {
        let rs = self.session.execute(&Statement::new(LIST_SCHEMAS)).await?;
        Ok(rs.first_column_strings())
    }

    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>, WarehouseError> {
        let stmt = Statement::new(LIST_TABLES).bind(dataset);
        Ok(self.session.execute(&stmt).await?.first_column_strings())
    }

    async fn list_columns(
        &self,
        dataset: &str,
        table: &str,
    ) -> Result<Vec<String>, WarehouseError> {
        let stmt = Statement::new(LIST_COLUMNS).bind(dataset).bind(table);
        Ok(self.session.execute(&stmt).await?.first_column_strings())
    }
}
