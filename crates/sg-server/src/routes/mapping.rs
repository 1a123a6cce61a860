//! `POST /upload_mapping`: publish the load mapping for the downstream job.

use crate::error::{ApiError, ApiResult};
use crate::routes::parse_json;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use sg_core::mapping::MappingConfig;
use sg_storage::publisher::{publish_mapping, PublishOutcome};
use std::sync::Arc;

pub async fn upload_mapping(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let payload = parse_json(&body)?;
    let config = MappingConfig::from_payload(&payload)?;
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("object storage is not configured".into()))?;

    let location = &state.mapping_location;
    let outcome = publish_mapping(store.as_ref(), location, &config)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let outcome = match outcome {
        PublishOutcome::Conflict => {
            return Err(ApiError::Conflict(format!(
                "File {} already exists in bucket {} and overwrite is set to false",
                location.key, location.bucket
            )))
        }
        PublishOutcome::Created => "created",
        PublishOutcome::Replaced => "replaced",
    };

    Ok(Json(json!({
        "message": format!(
            "File {} uploaded to bucket {} with overwrite={}",
            location.key, location.bucket, config.overwrite
        ),
        "outcome": outcome,
    })))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::*;
    use anyhow::Result;
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};
    use sg_storage::memory::MemoryStore;
    use sg_storage::ObjectLocation;
    use sg_warehouse::scripted::ScriptedWarehouse;

    fn mapping(table: &str) -> Value {
        json!({
            "gbq_output_table": table,
            "project_id": "analytics",
            "region": "us-central1",
            "temp_location": "gs://snow_to_gbq/tmp",
            "delimiter": ",",
            "gbq_write_mode": "WRITE_TRUNCATE"
        })
    }

    fn stored(store: &MemoryStore) -> Value {
        let obj = store
            .get(&ObjectLocation::new("snow_function", "mapping.json"))
            .unwrap();
        serde_json::from_slice(&obj.bytes).unwrap()
    }

    #[tokio::test]
    async fn create_then_replace() -> Result<()> {
        let wh = ScriptedWarehouse::new();
        let store = MemoryStore::new();

        let first = send(
            state(&wh, Some(&store)),
            Method::POST,
            "/upload_mapping",
            Some(mapping("a.b.first")),
        )
        .await?;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.body["outcome"], "created");
        assert_eq!(
            first.body["message"],
            "File mapping.json uploaded to bucket snow_function with overwrite=true"
        );

        let second = send(
            state(&wh, Some(&store)),
            Method::POST,
            "/upload_mapping",
            Some(mapping("a.b.second")),
        )
        .await?;
        assert_eq!(second.body["outcome"], "replaced");
        assert_eq!(stored(&store)["gbq_output_table"], "a.b.second");
        Ok(())
    }

    #[tokio::test]
    async fn conflict_without_overwrite() -> Result<()> {
        let wh = ScriptedWarehouse::new();
        let store = MemoryStore::new();
        send(
            state(&wh, Some(&store)),
            Method::POST,
            "/upload_mapping",
            Some(mapping("a.b.first")),
        )
        .await?;

        let mut body = mapping("a.b.second");
        body["overwrite"] = json!(false);
        let response = send(state(&wh, Some(&store)), Method::POST, "/upload_mapping", Some(body)).await?;

        assert_eq!(response.status, StatusCode::CONFLICT);
        assert!(response.body["error"].as_str().unwrap_or_default().contains("already exists"));
        assert_eq!(stored(&store)["gbq_output_table"], "a.b.first");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_delimiter_is_400() -> Result<()> {
        let mut body = mapping("a.b.c");
        body["delimiter"] = json!(";;");
        let store = MemoryStore::new();
        let response = send(
            state(&ScriptedWarehouse::new(), Some(&store)),
            Method::POST,
            "/upload_mapping",
            Some(body),
        )
        .await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"][0]["field"], "delimiter");
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_store_is_503() -> Result<()> {
        let response = send(
            state(&ScriptedWarehouse::new(), None),
            Method::POST,
            "/upload_mapping",
            Some(mapping("a.b.c")),
        )
        .await?;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }
}
