//! Storage integration and stage provisioning.
//!
//! Both statements are `CREATE OR REPLACE`, so repeating them converges on
//! the same end state. Failures are logged and collected as warnings; an
//! integration failure does not stop the stage step.

use crate::TransferSettings;
use serde::Serialize;
use sg_core::request::Destination;
use sg_warehouse::{Statement, WarehouseSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStep {
    Integration,
    Stage,
}

/// A provisioning statement that failed without aborting the transfer.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningWarning {
    pub step: ProvisioningStep,
    pub statement: String,
    pub message: String,
}

pub fn create_integration_sql(integration: &str, destination: &Destination) -> String {
    format!(
        "CREATE OR REPLACE STORAGE INTEGRATION {integration}\n\
         TYPE = EXTERNAL_STAGE\n\
         STORAGE_PROVIDER = GCS\n\
         ENABLED = TRUE\n\
         STORAGE_ALLOWED_LOCATIONS = ('{}')",
        destination.bucket_uri()
    )
}

pub fn create_stage_sql(stage: &str, integration: &str, destination: &Destination) -> String {
    format!(
        "CREATE OR REPLACE STAGE {stage}\n\
         URL='{}'\n\
         STORAGE_INTEGRATION={integration}",
        destination.bucket_uri()
    )
}

/// Issue the integration and stage statements in order.
pub async fn provision(
    session: &dyn WarehouseSession,
    settings: &TransferSettings,
    destination: &Destination,
) -> Vec<ProvisioningWarning> {
    let steps = [
        (
            ProvisioningStep::Integration,
            create_integration_sql(settings.integration_name(), destination),
        ),
        (
            ProvisioningStep::Stage,
            create_stage_sql(
                settings.stage_name(),
                settings.integration_name(),
                destination,
            ),
        ),
    ];

    let mut warnings = Vec::new();
    for (step, sql) in steps {
        tracing::debug!(?step, sql = %sql, "provisioning");
        match session.execute(&Statement::new(sql.as_str())).await {
            Ok(_) => tracing::info!(?step, "provisioned"),
            Err(e) => {
                tracing::warn!(?step, error = %e, "provisioning step failed, continuing");
                warnings.push(ProvisioningWarning {
                    step,
                    statement: sql,
                    message: e.to_string(),
                });
            }
        }
    }
    warnings
}
