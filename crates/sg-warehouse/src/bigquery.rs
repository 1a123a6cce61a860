//! BigQuery REST client: metadata enumeration and synchronous queries.

use crate::{MetadataCatalog, Statement, WarehouseError, WarehouseSession};
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sg_core::result::ResultSet;
use std::sync::Arc;

pub const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";
const QUERY_TIMEOUT_MS: u64 = 60_000;
const BIGQUERY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigquery"];

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetList {
    #[serde(default)]
    datasets: Vec<DatasetItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetItem {
    dataset_reference: DatasetReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetReference {
    dataset_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables: Vec<TableItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableItem {
    table_reference: TableReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    table_id: String,
}

#[derive(Debug, Deserialize)]
struct TableResource {
    schema: Option<TableSchema>,
}

#[derive(Debug, Default, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    query_parameters: Vec<QueryParameter<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameter<'a> {
    parameter_type: ParameterType,
    parameter_value: ParameterValue<'a>,
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue<'a> {
    value: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<Row>,
    job_reference: Option<JobReference>,
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

fn build_query_request(statement: &Statement) -> QueryRequest<'_> {
    let query_parameters: Vec<QueryParameter<'_>> = statement
        .bindings
        .iter()
        .map(|value| QueryParameter {
            parameter_type: ParameterType { kind: "STRING" },
            parameter_value: ParameterValue {
                value: value.as_str(),
            },
        })
        .collect();
    QueryRequest {
        query: &statement.text,
        use_legacy_sql: false,
        timeout_ms: QUERY_TIMEOUT_MS,
        parameter_mode: (!query_parameters.is_empty()).then_some("POSITIONAL"),
        query_parameters,
    }
}

fn rows_to_values(rows: Vec<Row>) -> Vec<Vec<Value>> {
    rows.into_iter()
        .map(|row| row.f.into_iter().map(|cell| cell.v).collect())
        .collect()
}

// ============================================================
// Client
// ============================================================

/// BigQuery client bound to one project.
#[derive(Clone)]
pub struct BigQueryClient {
    http: reqwest::Client,
    base_url: String,
    project: String,
    token_provider: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("base_url", &self.base_url)
            .field("project", &self.project)
            .field("token_provider", &"<TokenProvider>")
            .finish()
    }
}

impl BigQueryClient {
    pub fn new(project: impl Into<String>, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(BIGQUERY_API, project, token_provider)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        project: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project: project.into(),
            token_provider,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn project_url(&self) -> String {
        project_url(&self.base_url, &self.project)
    }

    async fn access_token(&self) -> Result<String, WarehouseError> {
        let token = self
            .token_provider
            .token(BIGQUERY_SCOPES)
            .await
            .map_err(|e| WarehouseError::Connect(format!("GCP authentication failed: {e}")))?;
        Ok(token.as_str().to_string())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WarehouseError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        let url = format!(
            "{}/queries/{}",
            self.project_url(),
            urlencoding::encode(&job.job_id)
        );
        let timeout = QUERY_TIMEOUT_MS.to_string();
        let mut query = vec![("timeoutMs", timeout.as_str())];
        if let Some(location) = job.location.as_deref() {
            query.push(("location", location));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.get_json(&url, &query).await
    }
}

fn project_url(base_url: &str, project: &str) -> String {
    format!("{base_url}/projects/{}", urlencoding::encode(project))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, WarehouseError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WarehouseError::Statement(format!(
            "BigQuery API error (HTTP {status}): {body}"
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| WarehouseError::Protocol(format!("response parse failed: {e}")))
}

#[async_trait]
impl WarehouseSession for BigQueryClient {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, WarehouseError> {
        tracing::debug!(sql = %statement.text, "running BigQuery query");
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/queries", self.project_url()))
            .bearer_auth(&token)
            .json(&build_query_request(statement))
            .send()
            .await?;
        let mut page: QueryResponse = read_json(response).await?;

        while !page.job_complete {
            let job = page.job_reference.clone().ok_or_else(|| {
                WarehouseError::Protocol("incomplete query without job reference".into())
            })?;
            page = self.get_query_results(&job, None).await?;
        }

        let columns = page
            .schema
            .take()
            .unwrap_or_default()
            .fields
            .into_iter()
            .map(|f| f.name)
            .collect();
        let mut rows = rows_to_values(std::mem::take(&mut page.rows));

        while let (Some(token), Some(job)) = (page.page_token.clone(), page.job_reference.clone()) {
            page = self.get_query_results(&job, Some(&token)).await?;
            rows.extend(rows_to_values(std::mem::take(&mut page.rows)));
        }

        Ok(ResultSet::new(columns, rows))
    }
}

#[async_trait]
impl MetadataCatalog for BigQueryClient {
    async fn list_datasets(&self) -> Result<Vec<String>, WarehouseError> {
        let url = format!("{}/datasets", self.project_url());
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|t| vec![("pageToken", t)])
                .unwrap_or_default();
            let page: DatasetList = self.get_json(&url, &query).await?;
            names.extend(page.datasets.into_iter().map(|d| d.dataset_reference.dataset_id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(names),
            }
        }
    }

    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>, WarehouseError> {
        let url = format!(
            "{}/datasets/{}/tables",
            self.project_url(),
            urlencoding::encode(dataset)
        );
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|t| vec![("pageToken", t)])
                .unwrap_or_default();
            let page: TableList = self.get_json(&url, &query).await?;
            names.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(names),
            }
        }
    }

    async fn list_columns(
        &self,
        dataset: &str,
        table: &str,
    ) -> Result<Vec<String>, WarehouseError> {
        let url = format!(
            "{}/datasets/{}/tables/{}",
            self.project_url(),
            urlencoding::encode(dataset),
            urlencoding::encode(table)
        );
        let resource: TableResource = self.get_json(&url, &[]).await?;
        Ok(resource
            .schema
            .unwrap_or_default()
            .fields
            .into_iter()
            .map(|f| f.name)
            .collect())
    }
}

// ============================================================
// Tests
// ============================================================
