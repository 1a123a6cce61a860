//! Application state shared across all route handlers.

use crate::config::{AssistantBackendConfig, AssistantConfig, Config};
use gcp_auth::TokenProvider;
use sg_assistant::gemini::GeminiModel;
use sg_assistant::{Answer, Assistant, ModelGateway, PromptBuilder, SqlDialect};
use sg_core::request::SnowflakeCredentials;
use sg_storage::gcs::GcsStore;
use sg_storage::{ObjectLocation, ObjectStore};
use sg_transfer::TransferSettings;
use sg_warehouse::bigquery::BigQueryClient;
use sg_warehouse::catalog::SnowflakeCatalog;
use sg_warehouse::snowflake::SnowflakeConnector;
use sg_warehouse::{WarehouseConnector, WarehouseError};
use std::sync::Arc;

/// Where assistant questions are grounded and executed.
pub enum AssistantBackend {
    BigQuery(BigQueryClient),
    Warehouse {
        connector: Arc<dyn WarehouseConnector>,
        credentials: SnowflakeCredentials,
    },
}

pub struct AssistantRuntime {
    assistant: Assistant,
    backend: AssistantBackend,
}

impl AssistantRuntime {
    pub fn new(assistant: Assistant, backend: AssistantBackend) -> Self {
        Self { assistant, backend }
    }

    /// Answer one question on a fresh client or session.
    pub async fn ask(&self, question: &str) -> Result<Answer, WarehouseError> {
        match &self.backend {
            AssistantBackend::BigQuery(client) => {
                Ok(self.assistant.answer(client, client, question).await)
            }
            AssistantBackend::Warehouse {
                connector,
                credentials,
            } => {
                let session = connector.connect(credentials).await?;
                let catalog = SnowflakeCatalog::new(session.as_ref());
                let answer = self
                    .assistant
                    .answer(&catalog, session.as_ref(), question)
                    .await;
                if let Err(e) = session.close().await {
                    tracing::warn!(error = %e, "failed to close assistant session");
                }
                Ok(answer)
            }
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Opens a Snowflake session per transfer request.
    pub connector: Arc<dyn WarehouseConnector>,
    /// `None` when no storage credentials are configured.
    pub store: Option<Arc<dyn ObjectStore>>,
    pub transfer: TransferSettings,
    pub mapping_location: ObjectLocation,
    /// `None` when no model API key is configured.
    pub assistant: Option<AssistantRuntime>,
}

impl AppState {
    /// Wire production collaborators. Google credentials are discovered
    /// through Application Default Credentials.
    pub async fn from_config(config: &Config) -> Self {
        let token_provider = match gcp_auth::provider().await {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(error = %e, "no Google credentials found");
                None
            }
        };
        Self::with_token_provider(config, token_provider)
    }

    pub fn with_token_provider(
        config: &Config,
        token_provider: Option<Arc<dyn TokenProvider>>,
    ) -> Self {
        let connector: Arc<dyn WarehouseConnector> = Arc::new(SnowflakeConnector::new());
        let store = token_provider
            .clone()
            .map(|provider| Arc::new(GcsStore::new(provider)) as Arc<dyn ObjectStore>);
        if store.is_none() {
            tracing::warn!("mapping uploads disabled without Google credentials");
        }

        let assistant = config.assistant.as_ref().and_then(|a| {
            build_assistant(a, token_provider.clone(), connector.clone())
        });
        if assistant.is_none() {
            tracing::warn!("assistant disabled");
        }

        Self {
            connector,
            store,
            transfer: config.transfer.clone(),
            mapping_location: ObjectLocation::new(
                config.mapping_bucket.as_str(),
                config.mapping_object.as_str(),
            ),
            assistant,
        }
    }
}

fn build_assistant(
    config: &AssistantConfig,
    token_provider: Option<Arc<dyn TokenProvider>>,
    connector: Arc<dyn WarehouseConnector>,
) -> Option<AssistantRuntime> {
    let (prompts, backend) = match &config.backend {
        AssistantBackendConfig::BigQuery { project } => {
            let Some(provider) = token_provider else {
                tracing::warn!(project = %project, "BigQuery assistant needs Google credentials");
                return None;
            };
            (
                PromptBuilder::new(SqlDialect::BigQuery, project.as_str()),
                AssistantBackend::BigQuery(BigQueryClient::new(project.as_str(), provider)),
            )
        }
        AssistantBackendConfig::Snowflake(credentials) => (
            PromptBuilder::new(SqlDialect::Snowflake, credentials.database.as_str()),
            AssistantBackend::Warehouse {
                connector,
                credentials: credentials.clone(),
            },
        ),
    };

    let model = Arc::new(GeminiModel::new(config.api_key.as_str(), config.model.as_str()));
    let gateway = ModelGateway::new(model, config.retry.clone());
    Some(AssistantRuntime::new(Assistant::new(gateway, prompts), backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |name| map.get(name).cloned()).unwrap()
    }

    #[test]
    fn without_google_credentials_storage_and_bigquery_are_disabled() {
        let c = config(&[
            ("GEMINI_API_KEY", "k"),
            ("SNOWGATE_BIGQUERY_PROJECT", "acme"),
        ]);
        let state = AppState::with_token_provider(&c, None);
        assert!(state.store.is_none());
        assert!(state.assistant.is_none());
        assert_eq!(state.mapping_location, ObjectLocation::new("snow_function", "mapping.json"));
    }

    #[test]
    fn snowflake_assistant_does_not_need_google_credentials() {
        let c = config(&[
            ("GEMINI_API_KEY", "k"),
            ("SNOWGATE_ASSISTANT_BACKEND", "snowflake"),
            ("SNOWGATE_SNOWFLAKE_USER", "u"),
            ("SNOWGATE_SNOWFLAKE_PASSWORD", "p"),
            ("SNOWGATE_SNOWFLAKE_ACCOUNT", "a"),
            ("SNOWGATE_SNOWFLAKE_DATABASE", "SHOP"),
            ("SNOWGATE_SNOWFLAKE_SCHEMA", "PUBLIC"),
            ("SNOWGATE_SNOWFLAKE_WAREHOUSE", "WH"),
            ("SNOWGATE_SNOWFLAKE_ROLE", "R"),
        ]);
        let state = AppState::with_token_provider(&c, None);
        assert!(state.store.is_none());
        assert!(state.assistant.is_some());
    }
}
