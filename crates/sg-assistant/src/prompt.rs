//! Prompt Builder: few-shot grounding text rendered from the live catalog.

use sg_core::catalog::{CatalogTable, SchemaCatalog};

/// SQL flavour the model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    BigQuery,
    Snowflake,
}

impl SqlDialect {
    pub fn label(self) -> &'static str {
        match self {
            SqlDialect::BigQuery => "BigQuery SQL",
            SqlDialect::Snowflake => "Snowflake SQL",
        }
    }
}

/// Renders the grounding prompt for one project (BigQuery) or database (Snowflake).
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    dialect: SqlDialect,
    project: String,
}

impl PromptBuilder {
    pub fn new(dialect: SqlDialect, project: impl Into<String>) -> Self {
        Self {
            dialect,
            project: project.into(),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn datasets_query(&self) -> String {
        match self.dialect {
            SqlDialect::BigQuery => {
                format!("SELECT * FROM `{}.INFORMATION_SCHEMA.SCHEMATA`;", self.project)
            }
            SqlDialect::Snowflake => {
                format!("SELECT * FROM {}.INFORMATION_SCHEMA.SCHEMATA;", self.project)
            }
        }
    }

    fn tables_query(&self, dataset: &str) -> String {
        match self.dialect {
            SqlDialect::BigQuery => format!(
                "SELECT * FROM `{}.{dataset}.INFORMATION_SCHEMA.TABLES`;",
                self.project
            ),
            SqlDialect::Snowflake => format!(
                "SELECT * FROM {}.INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = '{dataset}';",
                self.project
            ),
        }
    }

    fn qualified(&self, table: &CatalogTable) -> String {
        match self.dialect {
            SqlDialect::BigQuery => {
                format!("`{}.{}.{}`", self.project, table.dataset, table.table)
            }
            SqlDialect::Snowflake => format!("{}.{}.{}", self.project, table.dataset, table.table),
        }
    }

    fn example(&self, out: &mut String, question: &str, sql: &str) {
        out.push_str(&format!(
            "\n<natural language question>\n\"{question}\"\n<{} query>\n{sql}\n",
            self.dialect.label()
        ));
    }

    /// Preamble, one example per dataset, two per table, then the hand-off line.
    pub fn render(&self, catalog: &SchemaCatalog) -> String {
        let label = self.dialect.label();
        let mut out = format!(
            "You are an expert in converting natural language questions into {label} queries.\n\
             Your goal is to understand the user's intent and generate a valid {label} query.\n\
             Do not include newline characters in the response. Below are examples you can refer to while converting.\n"
        );

        self.example(&mut out, "give me all datasets", &self.datasets_query());

        for dataset in catalog.datasets() {
            self.example(
                &mut out,
                &format!("show me all tables in {dataset} dataset"),
                &self.tables_query(dataset),
            );

            for table in catalog.tables_in(dataset) {
                let name = self.qualified(table);
                self.example(
                    &mut out,
                    &format!(
                        "Show me total row count from {} table in {dataset} dataset.",
                        table.table
                    ),
                    &format!("SELECT COUNT(*) AS val FROM {name};"),
                );
                self.example(
                    &mut out,
                    &format!(
                        "Show me columns from {} table in {dataset} dataset.",
                        table.table
                    ),
                    &format!("SELECT {} FROM {name};", table.columns.join(", ")),
                );
            }
        }

        out.push_str("\nNow, generate the SQL query for the following question:\n");
        out
    }
}

/// Append the user's question to a rendered prompt.
pub fn compose(grounding: &str, question: &str) -> String {
    format!("{grounding}\nUser: {question}")
}
