//! Table-name correction for free-text questions.

use regex::RegexBuilder;
use sg_core::catalog::{CatalogTable, SchemaCatalog};

/// First catalog table whose name occurs in `question`, ignoring case.
///
/// Catalog order decides ties, not relevance: with tables `ORDER` and
/// `ORDERS`, whichever was catalogued first wins.
pub fn find_table_mention<'a>(question: &str, catalog: &'a SchemaCatalog) -> Option<&'a CatalogTable> {
    let haystack = question.to_lowercase();
    catalog
        .tables()
        .iter()
        .find(|t| haystack.contains(&t.table.to_lowercase()))
}

/// Rewrite whole-word mentions of the first matched table into `dataset.table`.
///
/// A question that already names the qualified table is returned unchanged.
pub fn qualify_table_mentions(question: &str, catalog: &SchemaCatalog) -> String {
    let Some(table) = find_table_mention(question, catalog) else {
        return question.to_string();
    };
    let qualified = table.key();
    if question.to_lowercase().contains(&qualified.to_lowercase()) {
        return question.to_string();
    }

    let pattern = format!(r"\b{}\b", regex::escape(&table.table));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.replace_all(question, qualified.as_str()).into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "table mention pattern rejected");
            question.to_string()
        }
    }
}
