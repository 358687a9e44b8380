use serde_json::{Map, Value};

use crate::client::BaseClient;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;

/// Retrieves the registration record of one workflow.
pub async fn get_workflow(client: &BaseClient, workflow_id: &str) -> Result<Value, String> {
    fetch(client, &format!("workflow/{workflow_id}"), "workflow info").await
}

/// Retrieves the detailed description of one workflow.
pub async fn get_workflow_details(
    client: &BaseClient,
    workflow_id: &str,
) -> Result<Value, String> {
    fetch(
        client,
        &format!("workflow/{workflow_id}/details"),
        "workflow details",
    )
    .await
}

/// Retrieves the default parameter set of one workflow, flattened from the
/// detail document's `params` section to a plain name→value map.
pub async fn get_workflow_params(
    client: &BaseClient,
    workflow_id: &str,
) -> Result<Value, String> {
    let details = get_workflow_details(client, workflow_id).await?;

    let params = details
        .get("params")
        .and_then(Value::as_object)
        .ok_or_else(|| "workflow details carry no 'params' section".to_string())?;

    let mut defaults = Map::new();
    for (name, spec) in params {
        defaults.insert(
            name.clone(),
            spec.get("value").cloned().unwrap_or(Value::Null),
        );
    }

    Ok(Value::Object(defaults))
}

async fn fetch(client: &BaseClient, path: &str, what: &str) -> Result<Value, String> {
    client.token().ensure_fresh().await;

    let outcome = resolve(client.token(), BodyKind::Json, &format!("GET /{path}"), || {
        client.get(path, None, RequestType::Plain)
    })
    .await;

    if outcome.error {
        return Err(format!(
            "retrieving the {what} failed: {}",
            outcome.failure_detail()
        ));
    }

    outcome
        .content
        .into_json()
        .ok_or_else(|| format!("{what} returned no JSON body"))
}
