use serde::Serialize;
use serde_json::Value;

use crate::client::BaseClient;
use crate::location::{AccessScope, DatasetLocation};
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;
use crate::utils::ensure_internal_uuid;

#[derive(Debug, Serialize)]
struct ListingBody<'a> {
    #[serde(rename = "internalID")]
    internal_id: &'a str,
    access: AccessScope,
    project: &'a str,
    path: &'a str,
    recursive: bool,
    zone: &'a str,
}

/// Retrieves the recursive file listing of a dataset.
///
/// The result is the nested directory document consumed by
/// [`crate::tree::DirectoryTree::from_listing`]; `path` narrows the listing
/// to a sub-directory of the dataset.
pub async fn list_dataset_files(
    client: &BaseClient,
    location: &DatasetLocation,
    path: &str,
) -> Result<Value, String> {
    ensure_internal_uuid(&location.internal_id)?;

    let body = serde_json::to_string(&ListingBody {
        internal_id: &location.internal_id,
        access: location.access,
        project: &location.project,
        path,
        recursive: true,
        zone: &location.zone,
    })
    .map_err(|e| e.to_string())?;

    let outcome = resolve(
        client.token(),
        BodyKind::Json,
        "POST /dataset/listing",
        || {
            client.post(
                "dataset/listing",
                None,
                RequestType::JSON {
                    body: body.clone(),
                },
            )
        },
    )
    .await;

    if outcome.error {
        return Err(format!(
            "retrieving the file listing failed: {}",
            outcome.failure_detail()
        ));
    }

    outcome
        .content
        .into_json()
        .ok_or_else(|| "file listing returned no JSON body".to_string())
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use crate::token::TokenCell;
    use crate::tree::DirectoryTree;

    use super::*;

    fn test_location() -> DatasetLocation {
        DatasetLocation::new(
            "5a0ca748-0b3a-4f83-a784-4b32b2f0f123",
            AccessScope::Project,
            "climate",
            "MainZone",
        )
    }

    #[tokio::test]
    async fn test_listing_feeds_the_tree_builder() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/dataset/listing")
                .body_contains("\"recursive\":true")
                .body_contains("5a0ca748-0b3a-4f83-a784-4b32b2f0f123");
            then.status(200).body(
                r#"{
                    "name": "root",
                    "type": "directory",
                    "contents": [
                        {"name": "a.txt", "type": "file", "size": 10,
                         "create_time": "T", "checksum": "c"}
                    ]
                }"#,
            );
        });

        let client =
            BaseClient::new(&server.base_url(), None, TokenCell::fixed("t")).unwrap();

        let listing = list_dataset_files(&client, &test_location(), "")
            .await
            .expect("Failed to list files");

        let tree = DirectoryTree::from_listing(&listing).expect("Failed to build tree");
        let rows = tree.file_rows();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "a.txt");
        assert_eq!(rows[0].path, "root/");
        mock.assert();
    }

    #[tokio::test]
    async fn test_listing_validates_internal_id() {
        let server = MockServer::start();
        let client =
            BaseClient::new(&server.base_url(), None, TokenCell::fixed("t")).unwrap();

        let mut location = test_location();
        location.internal_id = "garbage".to_string();

        assert!(list_dataset_files(&client, &location, "").await.is_err());
    }
}
