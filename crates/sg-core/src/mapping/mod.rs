//! Mapping configuration: hand-off document for the downstream load job.

use crate::validation::{check_single_char, PayloadReader, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Load settings published as JSON next to the exported data.
///
/// `gbq_write_mode` is passed through untouched; the consuming load step
/// decides which values it accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingConfig {
    /// Destination table identifier (`project.dataset.table`).
    pub gbq_output_table: String,
    pub project_id: String,
    pub region: String,
    /// Staging location used by the load job, e.g. `gs://bucket/tmp`.
    pub temp_location: String,
    /// Single-character field delimiter.
    pub delimiter: String,
    pub gbq_write_mode: String,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

impl MappingConfig {
    pub const FIELDS: [&'static str; 6] = [
        "gbq_output_table",
        "project_id",
        "region",
        "temp_location",
        "delimiter",
        "gbq_write_mode",
    ];

    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        let mut r = PayloadReader::new(payload);
        let config = Self {
            gbq_output_table: r.string("gbq_output_table"),
            project_id: r.string("project_id"),
            region: r.string("region"),
            temp_location: r.string("temp_location"),
            delimiter: r.checked_string("delimiter", check_single_char),
            gbq_write_mode: r.string("gbq_write_mode"),
            overwrite: r.bool_or("overwrite", default_overwrite()),
        };
        r.finish()?;
        Ok(config)
    }

    /// Pretty JSON with four-space indentation.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        Ok(out)
    }
}
