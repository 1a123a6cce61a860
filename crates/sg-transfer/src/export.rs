//! `COPY INTO` export of one table to a timestamped stage path.

use crate::TransferError;
use chrono::{DateTime, Utc};
use sg_core::request::{Destination, SourceTable};
use sg_warehouse::{Statement, WarehouseSession};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Stage-relative location `folder/YYYYMMDD_HHMMSS/file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub stage: String,
    pub folder: String,
    pub timestamp: String,
    pub file_name: String,
}

impl ExportTarget {
    pub fn new(stage: &str, destination: &Destination, now: DateTime<Utc>) -> Self {
        Self {
            stage: stage.to_string(),
            folder: destination.folder.clone(),
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            file_name: destination.file_name.clone(),
        }
    }

    pub fn object_path(&self) -> String {
        format!("{}/{}/{}", self.folder, self.timestamp, self.file_name)
    }
}

pub fn copy_into_sql(target: &ExportTarget, source: &SourceTable) -> String {
    format!(
        "COPY INTO @{}/{}\n\
         FROM {}\n\
         FILE_FORMAT = (TYPE = 'CSV' COMPRESSION = 'GZIP')\n\
         OVERWRITE = TRUE",
        target.stage,
        target.object_path(),
        source.quoted()
    )
}

/// Run the export. Any failure is fatal and is not retried.
pub async fn export_table(
    session: &dyn WarehouseSession,
    target: &ExportTarget,
    source: &SourceTable,
) -> Result<(), TransferError> {
    let sql = copy_into_sql(target, source);
    tracing::debug!(sql = %sql, "exporting table");
    match session.execute(&Statement::new(sql.as_str())).await {
        Ok(_) => {
            tracing::info!(path = %target.object_path(), "table exported");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "copy into failed");
            Err(TransferError::Copy {
                statement: sql,
                message: e.to_string(),
            })
        }
    }
}
