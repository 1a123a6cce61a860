//! Process configuration, read once from the environment at startup.

use sg_assistant::gemini::DEFAULT_MODEL;
use sg_core::request::SnowflakeCredentials;
use sg_core::retry::RetryPolicy;
use sg_core::validation::ValidationError;
use sg_transfer::{TransferSettings, DEFAULT_INTEGRATION_NAME, DEFAULT_STAGE_NAME};
use std::net::SocketAddr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAPPING_BUCKET: &str = "snow_function";
pub const DEFAULT_MAPPING_OBJECT: &str = "mapping.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error(transparent)]
    Settings(#[from] ValidationError),
}

/// Where the assistant reads its schema and runs generated queries.
#[derive(Debug, Clone)]
pub enum AssistantBackendConfig {
    BigQuery { project: String },
    Snowflake(SnowflakeCredentials),
}

#[derive(Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub model: String,
    pub retry: RetryPolicy,
    pub backend: AssistantBackendConfig,
}

#[derive(Clone)]
pub struct Config {
    pub http_addr: SocketAddr,
    pub cors_origin: String,
    pub transfer: TransferSettings,
    pub mapping_bucket: String,
    pub mapping_object: String,
    /// `None` when no model API key is configured.
    pub assistant: Option<AssistantConfig>,
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("retry", &self.retry)
            .field("backend", &self.backend)
            .finish()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_addr", &self.http_addr)
            .field("cors_origin", &self.cors_origin)
            .field("transfer", &self.transfer)
            .field("mapping_bucket", &self.mapping_bucket)
            .field("mapping_object", &self.mapping_object)
            .field("assistant", &self.assistant)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let http_addr = match env.string("SNOWGATE_HTTP_ADDR") {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                name: "SNOWGATE_HTTP_ADDR",
                reason: format!("{e}"),
            })?,
            None => {
                let port = env.parse::<u16>("PORT")?.unwrap_or(DEFAULT_PORT);
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let transfer = TransferSettings::new(
            env.string("SNOWGATE_STAGE_NAME")
                .unwrap_or_else(|| DEFAULT_STAGE_NAME.into()),
            env.string("SNOWGATE_INTEGRATION_NAME")
                .unwrap_or_else(|| DEFAULT_INTEGRATION_NAME.into()),
        )?;

        let assistant = assistant_config(&env)?;

        Ok(Self {
            http_addr,
            cors_origin: env.string("SNOWGATE_CORS_ORIGIN").unwrap_or_else(|| "*".into()),
            transfer,
            mapping_bucket: env
                .string("SNOWGATE_MAPPING_BUCKET")
                .unwrap_or_else(|| DEFAULT_MAPPING_BUCKET.into()),
            mapping_object: env
                .string("SNOWGATE_MAPPING_OBJECT")
                .unwrap_or_else(|| DEFAULT_MAPPING_OBJECT.into()),
            assistant,
        })
    }
}

fn assistant_config<F>(env: &Env<F>) -> Result<Option<AssistantConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(api_key) = env
        .string("GEMINI_API_KEY")
        .or_else(|| env.string("GOOGLE_API_KEY"))
    else {
        return Ok(None);
    };

    let mut retry = RetryPolicy::default();
    if let Some(attempts) = env.parse::<u32>("SNOWGATE_MODEL_MAX_ATTEMPTS")? {
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "SNOWGATE_MODEL_MAX_ATTEMPTS",
                reason: "must be at least 1".into(),
            });
        }
        retry.max_attempts = attempts;
    }
    if let Some(backoff) = env.parse::<u64>("SNOWGATE_MODEL_BACKOFF_MS")? {
        retry.backoff_ms = backoff;
    }

    let backend = match env.string("SNOWGATE_ASSISTANT_BACKEND").as_deref() {
        None | Some("bigquery") => AssistantBackendConfig::BigQuery {
            project: env.required("SNOWGATE_BIGQUERY_PROJECT")?,
        },
        Some("snowflake") => AssistantBackendConfig::Snowflake(SnowflakeCredentials {
            user: env.required("SNOWGATE_SNOWFLAKE_USER")?,
            password: env.required("SNOWGATE_SNOWFLAKE_PASSWORD")?,
            account: env.required("SNOWGATE_SNOWFLAKE_ACCOUNT")?,
            database: env.required("SNOWGATE_SNOWFLAKE_DATABASE")?,
            schema: env.required("SNOWGATE_SNOWFLAKE_SCHEMA")?,
            warehouse: env.required("SNOWGATE_SNOWFLAKE_WAREHOUSE")?,
            role: env.required("SNOWGATE_SNOWFLAKE_ROLE")?,
        }),
        Some(other) => {
            return Err(ConfigError::Invalid {
                name: "SNOWGATE_ASSISTANT_BACKEND",
                reason: format!("expected 'bigquery' or 'snowflake', got '{other}'"),
            })
        }
    };

    Ok(Some(AssistantConfig {
        api_key,
        model: env
            .string("SNOWGATE_GEMINI_MODEL")
            .unwrap_or_else(|| DEFAULT_MODEL.into()),
        retry,
        backend,
    }))
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.string(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
    }
}
