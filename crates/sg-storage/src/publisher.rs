//! Mapping publication.
//!
//! Existence check, optional delete, then write. The check and the write
//! are separate calls, so two concurrent publishers can both see "absent";
//! the hand-off object has a single writer in practice.

use crate::{ObjectLocation, ObjectStore, StorageError};
use sg_core::mapping::MappingConfig;

pub const MAPPING_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing was there; the object was written.
    Created,
    /// The previous object was deleted and rewritten.
    Replaced,
    /// The object exists and overwrite was off; nothing was written.
    Conflict,
}

/// Serialize `config` and publish it at `location`, honoring `config.overwrite`.
pub async fn publish_mapping(
    store: &dyn ObjectStore,
    location: &ObjectLocation,
    config: &MappingConfig,
) -> Result<PublishOutcome, StorageError> {
    let bytes = config.to_json_bytes()?;

    let outcome = if store.exists(location).await? {
        if !config.overwrite {
            tracing::warn!(%location, "mapping exists and overwrite is disabled");
            return Ok(PublishOutcome::Conflict);
        }
        store.delete(location).await?;
        PublishOutcome::Replaced
    } else {
        PublishOutcome::Created
    };

    store.put(location, bytes, MAPPING_CONTENT_TYPE).await?;
    tracing::info!(%location, ?outcome, "mapping published");
    Ok(outcome)
}
