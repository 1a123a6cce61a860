//! Schema Cataloger: walk datasets, tables and columns into a [`SchemaCatalog`].
//!
//! Every enumeration call that fails is logged and treated as empty for
//! its scope. Tables whose column list comes back empty are left out.

use sg_core::catalog::SchemaCatalog;
use sg_warehouse::MetadataCatalog;

pub async fn build_catalog(source: &dyn MetadataCatalog) -> SchemaCatalog {
    let mut catalog = SchemaCatalog::new();

    let datasets = source.list_datasets().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to list datasets");
        Vec::new()
    });

    for dataset in datasets {
        catalog.add_dataset(dataset.as_str());

        let tables = source.list_tables(&dataset).await.unwrap_or_else(|e| {
            tracing::warn!(%dataset, error = %e, "failed to list tables");
            Vec::new()
        });

        for table in tables {
            let columns = match source.list_columns(&dataset, &table).await {
                Ok(columns) => columns,
                Err(e) => {
                    tracing::warn!(%dataset, %table, error = %e, "failed to read table schema");
                    continue;
                }
            };
            if columns.is_empty() {
                continue;
            }
            catalog.insert_table(dataset.as_str(), table, columns);
        }
    }

    tracing::info!(
        datasets = catalog.datasets().len(),
        tables = catalog.len(),
        "schema catalog built"
    );
    catalog
}
