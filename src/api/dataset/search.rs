//! Dataset inventory search
//!
//! The search endpoint answers with loosely shaped records whose metadata
//! fields may be absent, strings, or lists of strings depending on how the
//! dataset was registered. Records decode tolerantly and expose accessor
//! methods that substitute `UNKNOWN <field>` placeholders, so the
//! presentation layer never deals with the variance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::BaseClient;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;

/// Location part of a search record; everything optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecordLocation {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(rename = "internalID", default)]
    pub internal_id: Option<String>,
}

/// One dataset as reported by the search endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatasetRecord {
    #[serde(default)]
    pub location: RecordLocation,
    #[serde(default)]
    pub metadata: Value,
}

impl DatasetRecord {
    pub fn title(&self) -> String {
        metadata_text(&self.metadata, "title")
            .unwrap_or_else(|| "UNKNOWN title".to_string())
    }

    pub fn creation_date(&self) -> String {
        metadata_text(&self.metadata, "CreationDate")
            .unwrap_or_else(|| "UNKNOWN CreationDate".to_string())
    }

    pub fn internal_id(&self) -> String {
        self.location
            .internal_id
            .clone()
            .unwrap_or_else(|| "UNKNOWN internalID".to_string())
    }

    pub fn access(&self) -> String {
        self.location
            .access
            .clone()
            .unwrap_or_else(|| "UNKNOWN access".to_string())
    }

    pub fn project(&self) -> String {
        self.location
            .project
            .clone()
            .unwrap_or_else(|| "UNKNOWN project".to_string())
    }

    pub fn zone(&self) -> String {
        self.location
            .zone
            .clone()
            .unwrap_or_else(|| "UNKNOWN zone".to_string())
    }
}

/// A metadata field that may be a string or a list of strings.
fn metadata_text(metadata: &Value, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            let texts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join(" "))
            }
        }
        _ => None,
    }
}

/// Retrieves all datasets visible to the session.
pub async fn list_datasets(client: &BaseClient) -> Result<Vec<DatasetRecord>, String> {
    let outcome = resolve(
        client.token(),
        BodyKind::Json,
        "POST /dataset/search/metadata",
        || {
            client.post(
                "dataset/search/metadata",
                None,
                RequestType::JSON {
                    body: "{}".to_string(),
                },
            )
        },
    )
    .await;

    if outcome.error {
        return Err(format!(
            "retrieving the datasets failed: {}",
            outcome.failure_detail()
        ));
    }

    let value = outcome
        .content
        .into_json()
        .ok_or_else(|| "dataset search returned no JSON body".to_string())?;

    serde_json::from_value(value)
        .map_err(|e| format!("dataset search response has an unexpected shape: {e}"))
}
