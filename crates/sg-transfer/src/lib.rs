//! sg-transfer: Snowflake table export into a GCS bucket.
//!
//! [`run_transfer`] opens a session, provisions the storage integration and
//! stage ([`provision`]), runs the `COPY INTO` export ([`export`]) and closes
//! the session again.

pub mod export;
pub mod provision;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sg_core::request::TransferRequest;
use sg_core::validation::{check_identifier, FieldIssue, ValidationError};
use sg_warehouse::WarehouseConnector;
use thiserror::Error;

pub use provision::ProvisioningWarning;

pub const DEFAULT_STAGE_NAME: &str = "CPULOADSTG";
pub const DEFAULT_INTEGRATION_NAME: &str = "gcs_int";
pub const SUCCESS_MESSAGE: &str = "Data copied from Snowflake to GCS successfully.";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to connect to Snowflake: {0}")]
    Connect(String),
    #[error("an error occurred while copying data: {message}")]
    Copy { statement: String, message: String },
}

/// Names of the warehouse objects the pipeline provisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    stage_name: String,
    integration_name: String,
}

impl TransferSettings {
    /// Both names are spliced into DDL, so they must be plain identifiers.
    pub fn new(
        stage_name: impl Into<String>,
        integration_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let stage_name = stage_name.into();
        let integration_name = integration_name.into();
        let issues: Vec<FieldIssue> = [
            ("stage_name", &stage_name),
            ("integration_name", &integration_name),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            check_identifier(value)
                .err()
                .map(|reason| FieldIssue::new(field, reason))
        })
        .collect();
        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }
        Ok(Self {
            stage_name,
            integration_name,
        })
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn integration_name(&self) -> &str {
        &self.integration_name
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            stage_name: DEFAULT_STAGE_NAME.into(),
            integration_name: DEFAULT_INTEGRATION_NAME.into(),
        }
    }
}

/// Successful transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub message: String,
    /// Object path inside the bucket, e.g. `exports/20240115_093000/orders.csv.gz`.
    pub object_path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ProvisioningWarning>,
}

/// Run the full transfer for an already validated request.
///
/// `now` fixes the timestamp segment of the object path.
pub async fn run_transfer(
    connector: &dyn WarehouseConnector,
    request: &TransferRequest,
    settings: &TransferSettings,
    now: DateTime<Utc>,
) -> Result<TransferReport, TransferError> {
    let destination = request.destination();
    let session = connector
        .connect(request.credentials())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "snowflake connection failed");
            TransferError::Connect(e.to_string())
        })?;
    tracing::info!(account = %request.credentials().account, "snowflake session established");

    let warnings = provision::provision(session.as_ref(), settings, destination).await;
    let target = export::ExportTarget::new(settings.stage_name(), destination, now);
    let outcome = export::export_table(session.as_ref(), &target, &request.source()).await;

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "failed to close snowflake session");
    }

    outcome?;
    Ok(TransferReport {
        message: SUCCESS_MESSAGE.into(),
        object_path: target.object_path(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use sg_warehouse::scripted::ScriptedWarehouse;

    fn request() -> TransferRequest {
        TransferRequest::from_payload(&json!({
            "snowflake_user": "loader",
            "snowflake_password": "hunter2",
            "snowflake_account": "xy12345.us-east-1",
            "snowflake_database": "SHOP",
            "snowflake_schema": "PUBLIC",
            "snowflake_table": "ORDERS",
            "snowflake_warehouse": "COMPUTE_WH",
            "snowflake_role": "SYSADMIN",
            "gcs_bucket_name": "acme-exports",
            "gcs_project_id": "acme",
            "gcs_folder_name": "exports",
            "gcs_file_name": "orders.csv.gz"
        }))
        .unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn orders_export_end_to_end() {
        let wh = ScriptedWarehouse::new();
        let report = run_transfer(&wh, &request(), &TransferSettings::default(), at())
            .await
            .unwrap();

        assert_eq!(report.object_path, "exports/20240115_093000/orders.csv.gz");
        assert_eq!(report.message, SUCCESS_MESSAGE);
        assert!(report.warnings.is_empty());

        let statements = wh.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE OR REPLACE STORAGE INTEGRATION gcs_int"));
        assert!(statements[1].starts_with("CREATE OR REPLACE STAGE CPULOADSTG"));
        let copy = &statements[2];
        assert!(copy.contains("COPY INTO @CPULOADSTG/exports/20240115_093000/orders.csv.gz"));
        assert!(copy.contains(r#"FROM "SHOP"."PUBLIC"."ORDERS""#));
        assert!(copy.contains("FILE_FORMAT = (TYPE = 'CSV' COMPRESSION = 'GZIP')"));
        assert!(copy.contains("OVERWRITE = TRUE"));
        assert_eq!(wh.close_count(), 1);
    }

    #[tokio::test]
    async fn copy_failure_is_fatal_and_carries_statement() {
        let wh = ScriptedWarehouse::new();
        wh.fail("COPY INTO", "insufficient privileges");
        let err = run_transfer(&wh, &request(), &TransferSettings::default(), at())
            .await
            .unwrap_err();
        match err {
            TransferError::Copy { statement, message } => {
                assert!(statement.starts_with("COPY INTO @CPULOADSTG/"));
                assert!(message.contains("insufficient privileges"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(wh.close_count(), 1);
    }

    #[tokio::test]
    async fn connect_failure_issues_no_statements() {
        let wh = ScriptedWarehouse::new();
        wh.fail_connect("incorrect username or password");
        let err = run_transfer(&wh, &request(), &TransferSettings::default(), at())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Connect(_)));
        assert!(wh.statements().is_empty());
    }

    #[tokio::test]
    async fn stage_failure_is_reported_but_copy_still_runs() {
        let wh = ScriptedWarehouse::new();
        wh.fail("CREATE OR REPLACE STAGE", "stage denied");
        let report = run_transfer(&wh, &request(), &TransferSettings::default(), at())
            .await
            .unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].step, provision::ProvisioningStep::Stage);
        assert!(wh.statements()[2].starts_with("COPY INTO"));
    }

    #[test]
    fn settings_reject_non_identifiers() {
        let err = TransferSettings::new("my stage", "gcs_int").unwrap_err();
        assert_eq!(err.fields(), vec!["stage_name"]);
        assert!(TransferSettings::new("LOAD_STG", "gcs_int2").is_ok());
    }
}
