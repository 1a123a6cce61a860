//! `POST /ask`: answer a natural-language question with generated SQL.

use crate::error::{ApiError, ApiResult};
use crate::routes::parse_json;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use sg_assistant::Answer;
use sg_core::validation::PayloadReader;
use std::sync::Arc;

fn not_blank(question: &str) -> Result<(), String> {
    if question.trim().is_empty() {
        Err("must not be empty".into())
    } else {
        Ok(())
    }
}

pub async fn ask(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Json<Answer>> {
    let payload = parse_json(&body)?;
    let mut reader = PayloadReader::new(&payload);
    let question = reader.checked_string("question", not_blank);
    reader.finish()?;

    let runtime = state
        .assistant
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("assistant is not configured".into()))?;

    let answer = runtime
        .ask(question.trim())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::*;
    use crate::state::{AssistantBackend, AssistantRuntime};
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use sg_assistant::{Assistant, LanguageModel, ModelError, ModelGateway, PromptBuilder, SqlDialect};
    use sg_core::request::SnowflakeCredentials;
    use sg_core::result::ResultSet;
    use sg_core::retry::RetryPolicy;
    use sg_warehouse::scripted::ScriptedWarehouse;
    use std::sync::Arc;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            Ok(self.0.to_string())
        }
    }

    fn credentials() -> SnowflakeCredentials {
        SnowflakeCredentials {
            user: "u".into(),
            password: "p".into(),
            account: "a".into(),
            database: "SHOP".into(),
            schema: "PUBLIC".into(),
            warehouse: "WH".into(),
            role: "R".into(),
        }
    }

    fn runtime(reply: &'static str, warehouse: &ScriptedWarehouse) -> AssistantRuntime {
        let gateway = ModelGateway::new(Arc::new(FixedModel(reply)), RetryPolicy::default());
        AssistantRuntime::new(
            Assistant::new(gateway, PromptBuilder::new(SqlDialect::Snowflake, "SHOP")),
            AssistantBackend::Warehouse {
                connector: Arc::new(warehouse.clone()),
                credentials: credentials(),
            },
        )
    }

    #[tokio::test]
    async fn answers_with_rows() -> Result<()> {
        let wh = ScriptedWarehouse::new();
        wh.respond(
            "FROM SHOP.SALES.ORDERS",
            ResultSet::new(vec!["VAL".into()], vec![vec![json!(7)]]),
        );
        let mut app = state(&wh, None);
        app.assistant = Some(runtime("SELECT COUNT(*) AS val FROM SHOP.SALES.ORDERS;", &wh));

        let response = send(app, Method::POST, "/ask", Some(json!({"question": "how many orders?"}))).await?;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["question"], "how many orders?");
        assert_eq!(response.body["sql"], "SELECT COUNT(*) AS val FROM SHOP.SALES.ORDERS;");
        assert_eq!(
            response.body["result"],
            json!({"kind": "table", "columns": ["VAL"], "rows": [[7]]})
        );
        assert_eq!(wh.close_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn non_sql_reply_is_a_fallback() -> Result<()> {
        let wh = ScriptedWarehouse::new();
        let mut app = state(&wh, None);
        app.assistant = Some(runtime("I am not sure.", &wh));

        let response = send(app, Method::POST, "/ask", Some(json!({"question": "weather?"}))).await?;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["result"]["kind"], "fallback");
        assert!(response.body["sql"].is_null());
        Ok(())
    }

    #[tokio::test]
    async fn blank_question_is_400() -> Result<()> {
        let wh = ScriptedWarehouse::new();
        let mut app = state(&wh, None);
        app.assistant = Some(runtime("SELECT 1;", &wh));
        let response = send(app, Method::POST, "/ask", Some(json!({"question": "   "}))).await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body,
            json!({"error": [{"field": "question", "reason": "must not be empty"}]})
        );
        assert_eq!(wh.connect_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unconfigured_assistant_is_503() -> Result<()> {
        let response = send(
            state(&ScriptedWarehouse::new(), None),
            Method::POST,
            "/ask",
            Some(json!({"question": "how many orders?"})),
        )
        .await?;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }
}
