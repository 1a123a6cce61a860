//! NL-to-SQL pipeline: catalog → prompt → model → extract → execute.

use crate::cataloger::build_catalog;
use crate::extract::{KeywordExtractor, SqlExtractor};
use crate::gateway::ModelGateway;
use crate::mention::qualify_table_mentions;
use crate::prompt::{compose, PromptBuilder};
use serde::Serialize;
use sg_core::result::QueryResult;
use sg_warehouse::{MetadataCatalog, Statement, WarehouseSession};

pub const MODEL_UNAVAILABLE_MESSAGE: &str = "Failed to get response from the language model.";
pub const EXECUTION_FAILED_MESSAGE: &str = "Failed to execute the generated SQL query.";
pub const NO_SQL_MESSAGE: &str = "I am sorry, I am unable to provide you with the response. \
     This is because your question needs to be improved or the data you are requesting is \
     beyond the scope of what is available to me.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    /// The statement that was executed, if one was extracted.
    pub sql: Option<String>,
    pub result: QueryResult,
}

pub struct Assistant {
    gateway: ModelGateway,
    prompts: PromptBuilder,
    extractor: Box<dyn SqlExtractor>,
}

impl Assistant {
    pub fn new(gateway: ModelGateway, prompts: PromptBuilder) -> Self {
        Self {
            gateway,
            prompts,
            extractor: Box::new(KeywordExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn SqlExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Answer one question. Model and execution problems degrade to a
    /// fallback message; nothing here fails the request.
    pub async fn answer(
        &self,
        catalog: &dyn MetadataCatalog,
        warehouse: &dyn WarehouseSession,
        question: &str,
    ) -> Answer {
        let schema = build_catalog(catalog).await;
        let rewritten = qualify_table_mentions(question, &schema);
        if rewritten != question {
            tracing::debug!(%rewritten, "qualified table mention");
        }
        let prompt = compose(&self.prompts.render(&schema), &rewritten);

        let reply = |sql: Option<String>, result: QueryResult| Answer {
            question: question.to_string(),
            sql,
            result,
        };

        let response = match self.gateway.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "no model response");
                return reply(None, QueryResult::fallback(MODEL_UNAVAILABLE_MESSAGE));
            }
        };

        let Some(sql) = self.extractor.extract(&response) else {
            tracing::info!("model response contained no SQL statement");
            return reply(None, QueryResult::fallback(NO_SQL_MESSAGE));
        };

        tracing::info!(sql = %sql, "executing generated query");
        match warehouse.execute(&Statement::new(sql.as_str())).await {
            Ok(rows) => reply(Some(sql), QueryResult::Table(rows)),
            Err(e) => {
                tracing::error!(error = %e, sql = %sql, "generated query failed");
                reply(Some(sql), QueryResult::fallback(EXECUTION_FAILED_MESSAGE))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FencedBlockExtractor;
    use crate::gateway::testing::{server_error, RecordingSleeper, ScriptedModel};
    use crate::prompt::SqlDialect;
    use serde_json::json;
    use sg_core::result::ResultSet;
    use sg_core::retry::RetryPolicy;
    use sg_warehouse::scripted::{ScriptedCatalog, ScriptedWarehouse};
    use std::sync::Arc;

    fn sales_catalog() -> ScriptedCatalog {
        ScriptedCatalog {
            datasets: Some(vec!["SALES".into()]),
            tables: vec![("SALES".into(), Some(vec!["ORDERS".into()]))],
            columns: vec![(
                ("SALES".into(), "ORDERS".into()),
                Some(vec!["ID".into(), "AMOUNT".into()]),
            )],
        }
    }

    fn assistant(model: Arc<ScriptedModel>) -> Assistant {
        let gateway = ModelGateway::new(model, RetryPolicy::default())
            .with_sleeper(Arc::new(RecordingSleeper::default()));
        Assistant::new(gateway, PromptBuilder::new(SqlDialect::BigQuery, "acme"))
    }

    #[tokio::test]
    async fn executes_extracted_sql_and_returns_rows() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            "SELECT COUNT(*) AS val FROM `acme.SALES.ORDERS`;".into(),
        )]));
        let wh = ScriptedWarehouse::new();
        wh.respond(
            "COUNT(*)",
            ResultSet::new(vec!["val".into()], vec![vec![json!(42)]]),
        );

        let answer = assistant(model.clone())
            .answer(&sales_catalog(), &wh, "how many orders are there?")
            .await;

        assert_eq!(
            answer.sql.as_deref(),
            Some("SELECT COUNT(*) AS val FROM `acme.SALES.ORDERS`;")
        );
        match answer.result {
            QueryResult::Table(rs) => assert_eq!(rs.rows, vec![vec![json!(42)]]),
            other => panic!("expected rows, got {other:?}"),
        }
        assert_eq!(answer.question, "how many orders are there?");

        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("SELECT COUNT(*) AS val FROM `acme.SALES.ORDERS`;"));
        assert!(prompt.contains("SELECT ID, AMOUNT FROM `acme.SALES.ORDERS`;"));
        assert!(prompt.ends_with("\nUser: how many SALES.ORDERS are there?"));
    }

    #[tokio::test]
    async fn non_sql_reply_is_not_executed() {
        let model = Arc::new(ScriptedModel::new(vec![Ok("I don't know".into())]));
        let wh = ScriptedWarehouse::new();
        let answer = assistant(model)
            .answer(&sales_catalog(), &wh, "what's the weather?")
            .await;

        assert_eq!(answer.result, QueryResult::fallback(NO_SQL_MESSAGE));
        assert!(answer.sql.is_none());
        assert!(wh.statements().is_empty());
    }

    #[tokio::test]
    async fn model_outage_degrades_to_fallback() {
        let model = Arc::new(ScriptedModel::new(vec![server_error()]));
        let wh = ScriptedWarehouse::new();
        let answer = assistant(model.clone())
            .answer(&sales_catalog(), &wh, "orders?")
            .await;

        assert_eq!(answer.result, QueryResult::fallback(MODEL_UNAVAILABLE_MESSAGE));
        assert_eq!(model.calls(), 3);
        assert!(wh.statements().is_empty());
    }

    #[tokio::test]
    async fn execution_failure_keeps_the_sql() {
        let model = Arc::new(ScriptedModel::new(vec![Ok("SELECT * FROM t;".into())]));
        let wh = ScriptedWarehouse::new();
        wh.fail("FROM t", "table not found");
        let answer = assistant(model).answer(&sales_catalog(), &wh, "t?").await;

        assert_eq!(answer.sql.as_deref(), Some("SELECT * FROM t;"));
        assert_eq!(answer.result, QueryResult::fallback(EXECUTION_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn fenced_extractor_can_be_swapped_in() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            "Sure:\n```sql\nSELECT ID FROM SHOP.SALES.ORDERS;\n```".into(),
        )]));
        let wh = ScriptedWarehouse::new();
        let answer = assistant(model)
            .with_extractor(Box::new(FencedBlockExtractor))
            .answer(&sales_catalog(), &wh, "list order ids")
            .await;

        assert_eq!(answer.sql.as_deref(), Some("SELECT ID FROM SHOP.SALES.ORDERS;"));
        assert_eq!(wh.statements(), vec!["SELECT ID FROM SHOP.SALES.ORDERS;"]);
    }
}
