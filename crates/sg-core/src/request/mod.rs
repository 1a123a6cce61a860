//! Transfer requests: warehouse credentials plus an object-storage destination.

use crate::validation::{
    check_bucket, check_file_name, check_folder, check_identifier, PayloadReader,
    ValidationError,
};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// SnowflakeCredentials
// ---------------------------------------------------------------------------

/// Login and session context for a Snowflake connection.
#[derive(Clone, PartialEq, Eq)]
pub struct SnowflakeCredentials {
    pub user: String,
    pub password: String,
    /// Account locator, e.g. `xy12345.us-east-2.aws`.
    pub account: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: String,
}

impl fmt::Debug for SnowflakeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Source / Destination
// ---------------------------------------------------------------------------

/// Fully-qualified source table. Every part has passed [`check_identifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl SourceTable {
    /// `"DB"."SCHEMA"."TABLE"`
    pub fn quoted(&self) -> String {
        format!("\"{}\".\"{}\".\"{}\"", self.database, self.schema, self.table)
    }
}

/// Where the exported file lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub bucket: String,
    pub project: String,
    pub folder: String,
    pub file_name: String,
}

impl Destination {
    /// `gcs://bucket/`
    pub fn bucket_uri(&self) -> String {
        format!("gcs://{}/", self.bucket)
    }
}

// ---------------------------------------------------------------------------
// TransferRequest
// ---------------------------------------------------------------------------

/// A validated transfer request. Only constructible through [`TransferRequest::from_payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    credentials: SnowflakeCredentials,
    table: String,
    destination: Destination,
}

impl TransferRequest {
    /// Wire names of every required field, in validation order.
    pub const FIELDS: [&'static str; 12] = [
        "snowflake_user",
        "snowflake_password",
        "snowflake_account",
        "snowflake_database",
        "snowflake_schema",
        "snowflake_table",
        "snowflake_warehouse",
        "snowflake_role",
        "gcs_bucket_name",
        "gcs_project_id",
        "gcs_folder_name",
        "gcs_file_name",
    ];

    /// Validate an untyped payload (the contents of `sourceData`).
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        let mut r = PayloadReader::new(payload);
        let user = r.string("snowflake_user");
        let password = r.string("snowflake_password");
        let account = r.string("snowflake_account");
        let database = r.checked_string("snowflake_database", check_identifier);
        let schema = r.checked_string("snowflake_schema", check_identifier);
        let table = r.checked_string("snowflake_table", check_identifier);
        let warehouse = r.string("snowflake_warehouse");
        let role = r.string("snowflake_role");
        let destination = Destination {
            bucket: r.checked_string("gcs_bucket_name", check_bucket),
            project: r.string("gcs_project_id"),
            folder: r.checked_string("gcs_folder_name", check_folder),
            file_name: r.checked_string("gcs_file_name", check_file_name),
        };
        r.finish()?;

        Ok(Self {
            credentials: SnowflakeCredentials {
                user,
                password,
                account,
                database,
                schema,
                warehouse,
                role,
            },
            table,
            destination,
        })
    }

    pub fn credentials(&self) -> &SnowflakeCredentials {
        &self.credentials
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn source(&self) -> SourceTable {
        SourceTable {
            database: self.credentials.database.clone(),
            schema: self.credentials.schema.clone(),
            table: self.table.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "snowflake_user": "loader",
            "snowflake_password": "hunter2",
            "snowflake_account": "xy12345.us-east-2.aws",
            "snowflake_database": "SALES_DB",
            "snowflake_schema": "PUBLIC",
            "snowflake_table": "ORDERS",
            "snowflake_warehouse": "COMPUTE_WH",
            "snowflake_role": "SYSADMIN",
            "gcs_bucket_name": "snow-exports",
            "gcs_project_id": "analytics-prod",
            "gcs_folder_name": "exports",
            "gcs_file_name": "orders.csv.gz"
        })
    }

    #[test]
    fn valid_payload_builds_request() {
        let req = TransferRequest::from_payload(&valid_payload()).unwrap();
        assert_eq!(req.credentials().warehouse, "COMPUTE_WH");
        assert_eq!(req.credentials().role, "SYSADMIN");
        assert_eq!(req.destination().bucket_uri(), "gcs://snow-exports/");
        assert_eq!(req.source().quoted(), "\"SALES_DB\".\"PUBLIC\".\"ORDERS\"");
    }

    #[test]
    fn each_missing_field_is_reported_alone() {
        for field in TransferRequest::FIELDS {
            let mut payload = valid_payload();
            payload.as_object_mut().unwrap().remove(field);
            let err = TransferRequest::from_payload(&payload).unwrap_err();
            assert_eq!(err.fields(), vec![field], "removing {field}");
        }
    }

    #[test]
    fn all_problems_reported_together() {
        let payload = json!({
            "snowflake_user": 42,
            "snowflake_table": "ORDERS; DROP TABLE x",
            "gcs_bucket_name": "snow-exports"
        });
        let err = TransferRequest::from_payload(&payload).unwrap_err();
        let fields = err.fields();
        assert!(fields.contains(&"snowflake_user"));
        assert!(fields.contains(&"snowflake_table"));
        assert!(!fields.contains(&"gcs_bucket_name"));
        assert_eq!(fields.len(), 11);
    }

    #[test]
    fn debug_output_redacts_password() {
        let req = TransferRequest::from_payload(&valid_payload()).unwrap();
        let rendered = format!("{:?}", req);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
