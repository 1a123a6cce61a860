//! Schema catalog: datasets, tables and column names used to ground prompts.

use serde::{Deserialize, Serialize};

/// One table and its ordered column names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogTable {
    pub dataset: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl CatalogTable {
    /// `dataset.table`
    pub fn key(&self) -> String {
        format!("{}.{}", self.dataset, self.table)
    }
}

/// Insertion-ordered catalog keyed by `dataset.table`.
///
/// Datasets are tracked separately so that a dataset without any readable
/// tables still shows up in prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaCatalog {
    datasets: Vec<String>,
    tables: Vec<CatalogTable>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dataset(&mut self, dataset: impl Into<String>) {
        let dataset = dataset.into();
        if !self.datasets.contains(&dataset) {
            self.datasets.push(dataset);
        }
    }

    /// Insert a table. Returns `false` (and changes nothing) if the key is taken.
    pub fn insert_table(
        &mut self,
        dataset: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
    ) -> bool {
        let entry = CatalogTable {
            dataset: dataset.into(),
            table: table.into(),
            columns,
        };
        if self.get(&entry.key()).is_some() {
            return false;
        }
        self.add_dataset(entry.dataset.clone());
        self.tables.push(entry);
        true
    }

    pub fn datasets(&self) -> &[String] {
        &self.datasets
    }

    pub fn tables(&self) -> &[CatalogTable] {
        &self.tables
    }

    pub fn tables_in<'a>(&'a self, dataset: &'a str) -> impl Iterator<Item = &'a CatalogTable> {
        self.tables.iter().filter(move |t| t.dataset == dataset)
    }

    pub fn get(&self, key: &str) -> Option<&CatalogTable> {
        self.tables.iter().find(|t| t.key() == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.tables.iter().map(CatalogTable::key).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_unique_keys() {
        let mut catalog = SchemaCatalog::new();
        assert!(catalog.insert_table("SALES", "ORDERS", vec!["ID".into()]));
        assert!(catalog.insert_table("HR", "PEOPLE", vec!["NAME".into()]));
        assert!(!catalog.insert_table("SALES", "ORDERS", vec!["OTHER".into()]));

        assert_eq!(catalog.keys(), vec!["SALES.ORDERS", "HR.PEOPLE"]);
        assert_eq!(catalog.datasets(), ["SALES", "HR"]);
        assert_eq!(catalog.get("SALES.ORDERS").unwrap().columns, vec!["ID"]);
    }

    #[test]
    fn empty_dataset_is_listed() {
        let mut catalog = SchemaCatalog::new();
        catalog.add_dataset("STAGING");
        catalog.add_dataset("STAGING");
        assert_eq!(catalog.datasets(), ["STAGING"]);
        assert!(catalog.is_empty());
        assert_eq!(catalog.tables_in("STAGING").count(), 0);
    }
}
