use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::client::BaseClient;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;

#[derive(Debug, Serialize)]
struct ExecuteBody {
    conf: Value,
    run_id: String,
}

/// Receipt of a triggered run. Older orchestration revisions spell the
/// identifier fields differently; both spellings decode to the same fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionReceipt {
    #[serde(default, alias = "dag_id")]
    pub workflow_id: Option<String>,
    #[serde(default, alias = "dag_run_id")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Triggers a run of a workflow.
///
/// The session's access token is threaded into the run configuration so
/// workflow tasks can act on the caller's behalf. A run id is generated when
/// the caller does not supply one.
pub async fn execute_workflow(
    client: &BaseClient,
    workflow_id: &str,
    parameters: Value,
    run_id: Option<String>,
) -> Result<ExecutionReceipt, String> {
    client.token().ensure_fresh().await;

    let mut conf = match parameters {
        Value::Null => Value::Object(Default::default()),
        object @ Value::Object(_) => object,
        _ => return Err("workflow parameters must be a JSON object".to_string()),
    };
    conf.as_object_mut()
        .expect("conf is an object by construction")
        .insert(
            "access_token".to_string(),
            Value::String(client.token().access_token().await),
        );

    let run_id = run_id.unwrap_or_else(generate_run_id);
    let body = serde_json::to_string(&ExecuteBody { conf, run_id }).map_err(|e| e.to_string())?;

    let path = format!("workflow/{workflow_id}/runs");
    let outcome = resolve(
        client.token(),
        BodyKind::Json,
        &format!("POST /{path}"),
        || {
            client.post(
                &path,
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
            "executing the workflow failed: {}",
            outcome.failure_detail()
        ));
    }

    let value = outcome
        .content
        .into_json()
        .ok_or_else(|| "workflow execution returned no JSON body".to_string())?;

    serde_json::from_value(value)
        .map_err(|e| format!("workflow execution response has an unexpected shape: {e}"))
}

fn generate_run_id() -> String {
    format!(
        "dpcli_exec_{}_{}",
        Local::now().format("%Y-%m-%dT%H-%M-%S"),
        Uuid::new_v4().simple()
    )
}
