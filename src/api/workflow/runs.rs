use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;

use crate::client::BaseClient;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;

/// One run of a workflow, with the execution timestamp reformatted for
/// display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowRun {
    pub run_id: String,
    pub execution_date: String,
    pub state: String,
}

/// Retrieves the run states of a workflow.
pub async fn workflow_runs(
    client: &BaseClient,
    workflow_id: &str,
) -> Result<Vec<WorkflowRun>, String> {
    client.token().ensure_fresh().await;

    let path = format!("workflow/{workflow_id}/runs");
    let outcome = resolve(
        client.token(),
        BodyKind::Json,
        &format!("GET /{path}"),
        || client.get(&path, None, RequestType::Plain),
    )
    .await;

    if outcome.error {
        return Err(format!(
            "retrieving the workflow runs failed: {}",
            outcome.failure_detail()
        ));
    }

    let value = outcome
        .content
        .into_json()
        .ok_or_else(|| "workflow runs returned no JSON body".to_string())?;

    let runs = value
        .get("runs")
        .or_else(|| value.get("dag_runs"))
        .and_then(Value::as_array)
        .ok_or_else(|| "workflow runs response carries no run list".to_string())?;

    Ok(runs.iter().map(decode_run).collect())
}

fn decode_run(run: &Value) -> WorkflowRun {
    WorkflowRun {
        run_id: text_field(run, &["run_id", "dag_run_id"])
            .unwrap_or_else(|| "UNKNOWN run_id".to_string()),
        execution_date: text_field(run, &["execution_date"])
            .map(|raw| format_timestamp(&raw))
            .unwrap_or_else(|| "UNKNOWN execution_date".to_string()),
        state: text_field(run, &["state"]).unwrap_or_else(|| "UNKNOWN state".to_string()),
    }
}

fn text_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| value.get(name).and_then(Value::as_str))
        .map(str::to_string)
}

/// RFC 3339 timestamps become ctime-style display strings; anything else
/// passes through untouched.
fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
