//! HTTP routes and the shared layer stack.

pub mod ask;
pub mod health;
pub mod mapping;
pub mod transfer;

use crate::state::AppState;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use sg_core::validation::ValidationError;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Origin, Content-Type, Accept, Authorization, X-Requested-With";

/// Build the application router. Every response carries the CORS headers.
pub fn router(state: Arc<AppState>, cors_origin: &str) -> Router {
    let origin = HeaderValue::from_str(cors_origin).unwrap_or_else(|_| {
        tracing::warn!(cors_origin, "invalid CORS origin, falling back to '*'");
        HeaderValue::from_static("*")
    });

    Router::new()
        .route("/health", get(health::health))
        .route("/transfer", post(transfer::transfer).options(preflight))
        .route(
            "/upload_mapping",
            post(mapping::upload_mapping).options(preflight),
        )
        .route("/ask", post(ask::ask).options(preflight))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            origin,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"))],
    )
}

/// Parse a request body as JSON, reporting failures as a `body` field issue.
pub(crate) fn parse_json(body: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(body)
        .map_err(|e| ValidationError::single("body", format!("invalid JSON: {e}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use sg_storage::memory::MemoryStore;
    use sg_storage::ObjectLocation;
    use sg_transfer::TransferSettings;
    use sg_warehouse::scripted::ScriptedWarehouse;
    use tower::ServiceExt;

    pub fn state(warehouse: &ScriptedWarehouse, store: Option<&MemoryStore>) -> AppState {
        AppState {
            connector: Arc::new(warehouse.clone()),
            store: store.map(|s| Arc::new(s.clone()) as Arc<dyn sg_storage::ObjectStore>),
            transfer: TransferSettings::default(),
            mapping_location: ObjectLocation::new("snow_function", "mapping.json"),
            assistant: None,
        }
    }

    pub struct TestResponse {
        pub status: StatusCode,
        pub headers: axum::http::HeaderMap,
        pub body: Value,
    }

    pub async fn send(
        state: AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let router = router(Arc::new(state), "*");
        let body = match body {
            Some(v) => Body::from(serde_json::to_vec(&v)?),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .context("build request")?;

        let response = match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .context("read response body")?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("parse JSON body")?
        };
        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }
}
