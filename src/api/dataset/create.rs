use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::BaseClient;
use crate::location::AccessScope;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;

/// Descriptive metadata recorded with a dataset.
///
/// Every field falls back to an explicit placeholder so a dataset can be
/// created from a partially filled metadata file without surprises.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetMetadata {
    pub title: String,
    pub creator: Vec<String>,
    pub contributor: Vec<String>,
    pub owner: Vec<String>,
    pub publisher: Vec<String>,
    pub publication_year: String,
    pub resource_type: String,
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        DatasetMetadata {
            title: format!(
                "UNTITLED_Dataset_{}",
                Local::now().format("%d-%m-%Y_%H:%M:%S")
            ),
            creator: vec!["UNKNOWN creator".to_string()],
            contributor: vec!["UNKNOWN contributor".to_string()],
            owner: vec!["UNKNOWN owner".to_string()],
            publisher: vec!["UNKNOWN publisher".to_string()],
            publication_year: Local::now().format("%Y").to_string(),
            resource_type: "UNKNOWN resource type".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateDatasetBody<'a> {
    push_method: &'a str,
    access: AccessScope,
    project: &'a str,
    zone: &'a str,
    path: &'a str,
    metadata: &'a DatasetMetadata,
}

/// Creates an empty dataset with the given location and metadata.
///
/// # Arguments
///
/// * `client` - The base client used for API communication
/// * `access` - Visibility scope of the new dataset
/// * `project` - Short name of the project the dataset belongs to
/// * `zone` - Storage zone; the session default when `None`
/// * `path` - Path inside the dataset to seed, usually empty
/// * `metadata` - Descriptive metadata recorded with the dataset
///
/// # Returns
///
/// The created-dataset document as returned by the server, or an error
/// message on failure.
pub async fn create_dataset(
    client: &BaseClient,
    access: AccessScope,
    project: &str,
    zone: Option<&str>,
    path: &str,
    metadata: &DatasetMetadata,
) -> Result<Value, String> {
    let zone = zone.unwrap_or_else(|| client.zone());
    let body = serde_json::to_string(&CreateDatasetBody {
        push_method: "empty",
        access,
        project,
        zone,
        path,
        metadata,
    })
    .map_err(|e| e.to_string())?;

    let outcome = resolve(client.token(), BodyKind::Json, "POST /dataset", || {
        client.post(
            "dataset",
            None,
            RequestType::JSON {
                body: body.clone(),
            },
        )
    })
    .await;

    if outcome.error {
        return Err(format!(
            "creating the dataset failed: {}",
            outcome.failure_detail()
        ));
    }

    outcome
        .content
        .into_json()
        .ok_or_else(|| "creating the dataset returned no JSON body".to_string())
}
