use serde_json::Value;

use crate::client::BaseClient;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;

/// Retrieves the workflows registered on the orchestration service.
pub async fn list_workflows(client: &BaseClient) -> Result<Value, String> {
    client.token().ensure_fresh().await;

    let outcome = resolve(client.token(), BodyKind::Json, "GET /workflow", || {
        client.get("workflow", None, RequestType::Plain)
    })
    .await;

    if outcome.error {
        return Err(format!(
            "retrieving the workflow list failed: {}",
            outcome.failure_detail()
        ));
    }

    outcome
        .content
        .into_json()
        .ok_or_else(|| "workflow list returned no JSON body".to_string())
}
