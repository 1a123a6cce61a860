//! Snowflake session client over the connector REST protocol.
//!
//! Login exchanges user/password for a session token, statements go to
//! `/queries/v1/query-request` with positional text bindings, and closing
//! deletes the server-side session.

use crate::{Statement, WarehouseConnector, WarehouseError, WarehouseSession};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sg_core::request::SnowflakeCredentials;
use sg_core::result::ResultSet;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

const CLIENT_APP_ID: &str = "snowgate";
const QUERY_IN_PROGRESS: &str = "333333";
const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
const POLL_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, BindValue<'a>>,
}

#[derive(Debug, Serialize)]
struct BindValue<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    success: bool,
    message: Option<String>,
    code: Option<String>,
}

impl<T> Envelope<T> {
    fn failure(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(msg)) => format!("{msg} (code {code})"),
            (None, Some(msg)) => msg.clone(),
            (Some(code), None) => format!("code {code}"),
            (None, None) => "no message".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponseData {
    token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponseData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
    get_result_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

// ============================================================
// Helpers
// ============================================================

/// `https://<account>.snowflakecomputing.com`
pub fn account_url(account: &str) -> String {
    format!("https://{}.snowflakecomputing.com", account.trim().to_lowercase())
}

/// Account name without region / cloud suffix: `xy12345.us-east-2.aws` -> `XY12345`.
pub fn account_name(account: &str) -> String {
    account
        .trim()
        .split('.')
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

fn build_query_request<'a>(statement: &'a Statement, sequence_id: u64) -> QueryRequest<'a> {
    let bindings = statement
        .bindings
        .iter()
        .enumerate()
        .map(|(i, value)| {
            (
                (i + 1).to_string(),
                BindValue {
                    kind: "TEXT",
                    value: value.as_str(),
                },
            )
        })
        .collect();
    QueryRequest {
        sql_text: &statement.text,
        async_exec: false,
        sequence_id,
        bindings,
    }
}

fn into_result_set(data: QueryResponseData) -> ResultSet {
    ResultSet::new(
        data.rowtype.into_iter().map(|r| r.name).collect(),
        data.rowset,
    )
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, WarehouseError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WarehouseError::Protocol(format!(
            "Snowflake returned HTTP {status}: {body}"
        )));
    }
    response
        .json::<Envelope<T>>()
        .await
        .map_err(|e| WarehouseError::Protocol(format!("response parse failed: {e}")))
}

// ============================================================
// Connector
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct SnowflakeConnector {
    http: reqwest::Client,
    /// Replaces the account-derived URL (proxies, private link).
    base_url: Option<String>,
}

impl SnowflakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: Some(base_url.into()),
        }
    }

    fn base_url_for(&self, account: &str) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| account_url(account))
            .trim_end_matches('/')
            .to_string()
    }
}

#[async_trait]
impl WarehouseConnector for SnowflakeConnector {
    async fn connect(
        &self,
        credentials: &SnowflakeCredentials,
    ) -> Result<Box<dyn WarehouseSession>, WarehouseError> {
        let base_url = self.base_url_for(&credentials.account);
        let request_id = Uuid::new_v4().to_string();
        let url = url::Url::parse_with_params(
            &format!("{base_url}/session/v1/login-request"),
            [
                ("warehouse", credentials.warehouse.as_str()),
                ("databaseName", credentials.database.as_str()),
                ("schemaName", credentials.schema.as_str()),
                ("roleName", credentials.role.as_str()),
                ("request_id", request_id.as_str()),
            ],
        )
        .map_err(|e| WarehouseError::Connect(format!("invalid account URL: {e}")))?;

        let login_account = account_name(&credentials.account);
        let body = LoginRequest {
            data: LoginData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: env!("CARGO_PKG_VERSION"),
                account_name: &login_account,
                login_name: &credentials.user,
                password: &credentials.password,
            },
        };

        let response = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| WarehouseError::Connect(format!("login request failed: {e}")))?;

        let envelope: Envelope<LoginResponseData> = read_envelope(response)
            .await
            .map_err(|e| WarehouseError::Connect(e.to_string()))?;
        if !envelope.success {
            return Err(WarehouseError::Connect(envelope.failure()));
        }
        let token = envelope
            .data
            .map(|d| d.token)
            .ok_or_else(|| WarehouseError::Connect("login response had no token".into()))?;

        tracing::info!(
            account = %credentials.account,
            user = %credentials.user,
            "Snowflake session established"
        );

        Ok(Box::new(SnowflakeSession {
            http: self.http.clone(),
            base_url,
            token,
            sequence: AtomicU64::new(0),
        }))
    }
}

// ============================================================
// Session
// ============================================================

pub struct SnowflakeSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
    sequence: AtomicU64,
}

impl std::fmt::Debug for SnowflakeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeSession")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl SnowflakeSession {
    fn auth_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    async fn poll_result(&self, result_path: &str) -> Result<QueryResponseData, WarehouseError> {
        let url = format!("{}{}", self.base_url, result_path);
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let response = self
                .http
                .get(&url)
                .header("Authorization", self.auth_header())
                .header("Accept", "application/json")
                .send()
                .await?;
            let envelope: Envelope<QueryResponseData> = read_envelope(response).await?;
            match envelope.code.as_deref() {
                Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC) => continue,
                _ if !envelope.success => {
                    return Err(WarehouseError::Statement(envelope.failure()))
                }
                _ => return Ok(envelope.data.unwrap_or_default()),
            }
        }
    }
}

#[async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, WarehouseError> {
        let sequence_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let url = url::Url::parse_with_params(
            &format!("{}/queries/v1/query-request", self.base_url),
            [("requestId", Uuid::new_v4().to_string())],
        )
        .map_err(|e| WarehouseError::Protocol(e.to_string()))?;

        tracing::debug!(sql = %statement.text, bindings = statement.bindings.len(), "executing");

        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(&build_query_request(statement, sequence_id))
            .send()
            .await?;

        let envelope: Envelope<QueryResponseData> = read_envelope(response).await?;
        let in_progress = matches!(
            envelope.code.as_deref(),
            Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
        );
        if in_progress {
            let result_path = envelope
                .data
                .and_then(|d| d.get_result_url)
                .ok_or_else(|| {
                    WarehouseError::Protocol("in-progress query without result URL".into())
                })?;
            return self.poll_result(&result_path).await.map(into_result_set);
        }
        if !envelope.success {
            return Err(WarehouseError::Statement(envelope.failure()));
        }
        Ok(into_result_set(envelope.data.unwrap_or_default()))
    }

    async fn close(&self) -> Result<(), WarehouseError> {
        let response = self
            .http
            .post(format!("{}/session?delete=true", self.base_url))
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WarehouseError::Protocol(format!(
                "session close returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ============================================================
// Tests
// ============================================================
