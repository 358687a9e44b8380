use serde::Serialize;
use serde_json::Value;

use crate::client::BaseClient;
use crate::location::AccessScope;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;
use crate::utils::ensure_internal_uuid;

#[derive(Debug, Serialize)]
struct DeleteDatasetBody<'a> {
    access: AccessScope,
    project: &'a str,
    #[serde(rename = "internalID")]
    internal_id: &'a str,
}

/// Deletes a dataset by its internal ID.
pub async fn delete_dataset(
    client: &BaseClient,
    internal_id: &str,
    access: AccessScope,
    project: &str,
) -> Result<Value, String> {
    ensure_internal_uuid(internal_id)?;

    let body = serde_json::to_string(&DeleteDatasetBody {
        access,
        project,
        internal_id,
    })
    .map_err(|e| e.to_string())?;

    let outcome = resolve(client.token(), BodyKind::Json, "DELETE /dataset", || {
        client.delete(
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
            "deleting the dataset failed: {}",
            outcome.failure_detail()
        ));
    }

    outcome
        .content
        .into_json()
        .ok_or_else(|| "deleting the dataset returned no JSON body".to_string())
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use crate::token::TokenCell;

    use super::*;

    const DATASET_ID: &str = "5a0ca748-0b3a-4f83-a784-4b32b2f0f123";

    #[tokio::test]
    async fn test_delete_dataset() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/dataset")
                .body_contains(DATASET_ID);
            then.status(200).body("{\"status\":\"deleted\"}");
        });

        let client =
            BaseClient::new(&server.base_url(), None, TokenCell::fixed("t")).unwrap();

        let result = delete_dataset(&client, DATASET_ID, AccessScope::Project, "climate")
            .await
            .expect("Failed to delete dataset");

        assert_eq!(result["status"], "deleted");
        mock.assert();
    }

    #[tokio::test]
    async fn test_delete_rejects_malformed_id_without_calling_out() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/dataset");
            then.status(200).body("{}");
        });

        let client =
            BaseClient::new(&server.base_url(), None, TokenCell::fixed("t")).unwrap();

        let err = delete_dataset(&client, "not-a-uuid", AccessScope::User, "climate")
            .await
            .unwrap_err();

        assert!(err.contains("not-a-uuid"));
        mock.assert_hits(0);
    }
}
