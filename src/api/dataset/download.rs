//! Staged dataset downloads
//!
//! Downloading a dataset is a three-phase protocol: submit a preparation
//! job, poll its status until the server reports a terminal state, then
//! stream the prepared archive to disk. Polling is strictly sequential and
//! re-validates the session credential before every attempt; exhausting the
//! retry budget is reported as a timeout distinct from a server-declared
//! failure.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::callback::TransferCallback;
use crate::client::BaseClient;
use crate::error::TransferError;
use crate::location::{AccessScope, DatasetLocation};
use crate::outcome::{resolve, resolve_raw, BodyKind};
use crate::request::RequestType;
use crate::token::TokenCell;
use crate::utils::ensure_internal_uuid;

/// Default status-poll retry budget.
pub const DEFAULT_POLL_RETRIES: u32 = 200;

/// Default delay between status polls.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(5);

const STATE_SUCCESS: &str = "SUCCESS";
const STATE_ERROR: &str = "ERROR";
const STATE_FAILURE: &str = "FAILURE";

/// Retry budget for the status-poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            max_retries: DEFAULT_POLL_RETRIES,
            delay: DEFAULT_POLL_DELAY,
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    zone: &'a str,
    access: AccessScope,
    project: &'a str,
    internal_id: &'a str,
    path: &'a str,
}

// Different server revisions spell the field request_id or requestId; both
// mean the same thing.
#[derive(Debug, Deserialize)]
struct SubmitReceipt {
    #[serde(default, alias = "requestId")]
    request_id: Option<String>,
}

/// Status of a server-side preparation job. States other than the three
/// terminal ones count as still pending.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub task_state: String,
    #[serde(default)]
    pub task_result: Option<Value>,
}

impl JobStatus {
    fn failure_reason(&self) -> String {
        match &self.task_result {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "no reason supplied".to_string(),
        }
    }
}

/// Submits a download-preparation job, returning the server's request id.
pub async fn submit_download(
    client: &BaseClient,
    location: &DatasetLocation,
    path: &str,
) -> Result<String, TransferError> {
    let body = serde_json::to_string(&SubmitBody {
        zone: &location.zone,
        access: location.access,
        project: &location.project,
        internal_id: &location.internal_id,
        path,
    })
    .map_err(|e| TransferError::Submit(e.to_string()))?;

    let outcome = resolve(
        client.token(),
        BodyKind::Json,
        "POST /transfer/download",
        || {
            client.post(
                "transfer/download",
                None,
                RequestType::JSON {
                    body: body.clone(),
                },
            )
        },
    )
    .await;

    if outcome.error {
        return Err(TransferError::Submit(outcome.failure_detail()));
    }

    let value = outcome
        .content
        .into_json()
        .ok_or_else(|| TransferError::Submit("submission returned no JSON body".to_string()))?;

    let receipt: SubmitReceipt =
        serde_json::from_value(value).map_err(|e| TransferError::Decode(e.to_string()))?;

    receipt
        .request_id
        .ok_or_else(|| TransferError::Submit("response carried no request id".to_string()))
}

/// One status poll for a previously submitted job.
pub async fn poll_status(
    client: &BaseClient,
    request_id: &str,
) -> Result<JobStatus, TransferError> {
    let path = format!("transfer/status/{request_id}");

    let outcome = resolve(client.token(), BodyKind::Json, "GET /transfer/status", || {
        client.get(&path, None, RequestType::Plain)
    })
    .await;

    if outcome.error {
        return Err(TransferError::Poll(outcome.failure_detail()));
    }

    let value = outcome
        .content
        .into_json()
        .ok_or_else(|| TransferError::Poll("status poll returned no JSON body".to_string()))?;

    serde_json::from_value(value).map_err(|e| TransferError::Decode(e.to_string()))
}

/// Drives `poll` until the job reports a terminal state.
///
/// The session credential is re-validated before every attempt, and each
/// attempt's outcome is evaluated before the next poll starts: the loop
/// both reads and may replace the shared credential, so it must stay
/// strictly sequential.
pub async fn poll_until_ready<F, Fut>(
    token: &TokenCell,
    config: &PollConfig,
    mut poll: F,
) -> Result<JobStatus, TransferError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobStatus, TransferError>>,
{
    for attempt in 0..config.max_retries {
        if !token.ensure_fresh().await {
            return Err(TransferError::Credential(
                "session credential expired and could not be renewed".to_string(),
            ));
        }

        let status = poll().await?;
        match status.task_state.as_str() {
            STATE_SUCCESS => return Ok(status),
            STATE_ERROR | STATE_FAILURE => {
                return Err(TransferError::JobFailed {
                    reason: status.failure_reason(),
                })
            }
            other => {
                debug!(
                    "download request not ready yet (state '{other}'), attempt {}/{}",
                    attempt + 1,
                    config.max_retries
                );
                tokio::time::sleep(config.delay).await;
            }
        }
    }

    Err(TransferError::PollTimeout {
        attempts: config.max_retries,
    })
}

/// Streams the prepared payload of a finished job to `destination`.
///
/// With a known content length the payload is written chunk by chunk with a
/// progress report after each one; without it the whole body is written in
/// a single call and no progress is reported. A local write failure leaves
/// the partially written file in place.
pub async fn fetch_download(
    client: &BaseClient,
    request_id: &str,
    destination: &Path,
    progress: Option<&TransferCallback>,
) -> Result<(), TransferError> {
    let path = format!("transfer/download/{request_id}");

    let response = resolve_raw(client.token(), "GET /transfer/download", || {
        client.get(&path, None, RequestType::Plain)
    })
    .await
    .map_err(|outcome| TransferError::Fetch(outcome.failure_detail()))?;

    let total = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    write_payload(destination, total, response, progress).await
}

pub(crate) async fn write_payload(
    destination: &Path,
    total: Option<u64>,
    response: reqwest::Response,
    progress: Option<&TransferCallback>,
) -> Result<(), TransferError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::File::create(destination).await?;

    match total {
        None => {
            // No length to report progress against
            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransferError::Fetch(e.to_string()))?;
            file.write_all(&bytes).await?;
        }
        Some(total) => {
            let mut stream = response.bytes_stream();
            let mut written: u64 = 0;

            while let Some(item) = stream.next().await {
                let chunk = item.map_err(|e| TransferError::Fetch(e.to_string()))?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;

                if let Some(callback) = progress {
                    callback.call(written, total);
                }
            }
        }
    }

    file.flush().await?;
    Ok(())
}

/// Downloads a dataset (optionally narrowed to `path`) to `destination`.
///
/// Submit, poll until ready, fetch.
pub async fn download_dataset(
    client: &BaseClient,
    location: &DatasetLocation,
    path: &str,
    destination: &Path,
    config: &PollConfig,
    progress: Option<&TransferCallback>,
) -> Result<(), TransferError> {
    ensure_internal_uuid(&location.internal_id).map_err(TransferError::Submit)?;

    let request_id = submit_download(client, location, path).await?;
    debug!("download request submitted as {request_id}");

    poll_until_ready(client.token(), config, || poll_status(client, &request_id)).await?;

    fetch_download(client, &request_id, destination, progress).await
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};

    use httpmock::prelude::*;

    use crate::test_utils::{scripted_response, CountingRefresher};
    use crate::token::TokenPair;

    use super::*;

    const DATASET_ID: &str = "5a0ca748-0b3a-4f83-a784-4b32b2f0f123";

    fn test_location() -> DatasetLocation {
        DatasetLocation::new(DATASET_ID, AccessScope::Project, "climate", "MainZone")
    }

    fn test_client(server: &MockServer) -> BaseClient {
        BaseClient::new(&server.base_url(), None, TokenCell::fixed("t")).unwrap()
    }

    fn pending() -> JobStatus {
        JobStatus {
            task_state: "PENDING".to_string(),
            task_result: None,
        }
    }

    fn succeeded() -> JobStatus {
        JobStatus {
            task_state: STATE_SUCCESS.to_string(),
            task_result: None,
        }
    }

    fn quick_config(max_retries: u32) -> PollConfig {
        PollConfig {
            max_retries,
            delay: Duration::from_millis(0),
        }
    }

    /// A cell whose expiry forces a refresh on every credential check, so
    /// the refresher call count equals the number of checks.
    fn always_expiring_cell(refresher: Arc<CountingRefresher>) -> TokenCell {
        TokenCell::new(TokenPair::new("a", "r").with_expiry(0), refresher)
    }

    #[tokio::test]
    async fn test_submit_accepts_both_request_id_spellings() {
        for body in ["{\"request_id\":\"req-1\"}", "{\"requestId\":\"req-1\"}"] {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST)
                    .path("/transfer/download")
                    .body_contains(DATASET_ID);
                then.status(200).body(body);
            });

            let client = test_client(&server);
            let request_id = submit_download(&client, &test_location(), "")
                .await
                .expect("Failed to submit download");

            assert_eq!(request_id, "req-1");
        }
    }

    #[tokio::test]
    async fn test_submit_without_request_id_is_terminal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/transfer/download");
            then.status(200).body("{\"unrelated\":\"field\"}");
        });

        let client = test_client(&server);
        let err = submit_download(&client, &test_location(), "")
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Submit(_)));
    }

    /// Scripted PENDING, PENDING, SUCCESS: exactly two still-pending
    /// cycles, a credential check before every poll, then ready.
    #[tokio::test]
    async fn test_poll_sequence_pending_pending_success() {
        let refresher = Arc::new(CountingRefresher::new(false));
        let token = always_expiring_cell(refresher.clone());

        let polls = Cell::new(0u32);
        let status = poll_until_ready(&token, &quick_config(10), || {
            let poll = polls.get();
            polls.set(poll + 1);
            async move {
                if poll < 2 {
                    Ok(pending())
                } else {
                    Ok(succeeded())
                }
            }
        })
        .await
        .expect("Poll loop failed");

        assert_eq!(status.task_state, STATE_SUCCESS);
        assert_eq!(polls.get(), 3);
        assert_eq!(refresher.calls(), 3);
    }

    #[tokio::test]
    async fn test_poll_timeout_reports_attempt_count_without_reason() {
        let token = TokenCell::fixed("t");

        let polls = Cell::new(0u32);
        let err = poll_until_ready(&token, &quick_config(3), || {
            polls.set(polls.get() + 1);
            async { Ok(pending()) }
        })
        .await
        .unwrap_err();

        assert_eq!(polls.get(), 3);
        match err {
            TransferError::PollTimeout { attempts } => assert_eq!(attempts, 3),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_server_failure_carries_reason() {
        let token = TokenCell::fixed("t");

        let err = poll_until_ready(&token, &quick_config(5), || async {
            Ok(JobStatus {
                task_state: STATE_FAILURE.to_string(),
                task_result: Some(Value::String("disk quota exceeded".to_string())),
            })
        })
        .await
        .unwrap_err();

        match err {
            TransferError::JobFailed { reason } => {
                assert_eq!(reason, "disk quota exceeded")
            }
            other => panic!("expected job failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_stops_when_credential_cannot_be_renewed() {
        let refresher = Arc::new(CountingRefresher::new(true));
        let token = always_expiring_cell(refresher.clone());

        let polls = Cell::new(0u32);
        let err = poll_until_ready(&token, &quick_config(5), || {
            polls.set(polls.get() + 1);
            async { Ok(pending()) }
        })
        .await
        .unwrap_err();

        assert_eq!(polls.get(), 0);
        assert!(matches!(err, TransferError::Credential(_)));
    }

    #[tokio::test]
    async fn test_fetch_reports_progress_with_content_length() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/transfer/download/req-1");
            then.status(200).body("prepared-archive-bytes");
        });

        let client = test_client(&server);
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("download.tar.gz");

        let reports = Arc::new(Mutex::new(Vec::new()));
        let reports_clone = Arc::clone(&reports);
        let callback = TransferCallback::wrap(move |done, total| {
            reports_clone.lock().unwrap().push((done, total));
        });

        fetch_download(&client, "req-1", &destination, Some(&callback))
            .await
            .expect("Fetch failed");

        let content = std::fs::read_to_string(&destination).unwrap();
        assert_eq!(content, "prepared-archive-bytes");

        let reports = reports.lock().unwrap();
        assert!(!reports.is_empty());
        let &(done, total) = reports.last().unwrap();
        assert_eq!(done, content.len() as u64);
        assert_eq!(total, content.len() as u64);
    }

    /// Without a content length the body is written in one call and the
    /// progress callback is never invoked.
    #[tokio::test]
    async fn test_write_payload_without_content_length() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("download.bin");

        let calls = Arc::new(Mutex::new(0u32));
        let calls_clone = Arc::clone(&calls);
        let callback = TransferCallback::wrap(move |_, _| {
            *calls_clone.lock().unwrap() += 1;
        });

        let response = scripted_response(200, "whole-body-at-once");
        write_payload(&destination, None, response, Some(&callback))
            .await
            .expect("Write failed");

        assert_eq!(
            std::fs::read_to_string(&destination).unwrap(),
            "whole-body-at-once"
        );
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_download_dataset_end_to_end() {
        let server = MockServer::start();

        let submit = server.mock(|when, then| {
            when.method(POST).path("/transfer/download");
            then.status(200).body("{\"request_id\":\"req-9\"}");
        });

        let status = server.mock(|when, then| {
            when.method(GET).path("/transfer/status/req-9");
            then.status(200)
                .body("{\"task_state\":\"SUCCESS\",\"task_result\":null}");
        });

        let fetch = server.mock(|when, then| {
            when.method(GET).path("/transfer/download/req-9");
            then.status(200).body("the-archive");
        });

        let client = test_client(&server);
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out/download.tar.gz");

        download_dataset(
            &client,
            &test_location(),
            "",
            &destination,
            &quick_config(5),
            None,
        )
        .await
        .expect("Download failed");

        submit.assert_hits(1);
        status.assert_hits(1);
        fetch.assert_hits(1);
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "the-archive");
    }

    #[tokio::test]
    async fn test_download_dataset_rejects_malformed_id() {
        let server = MockServer::start();
        let client = test_client(&server);
        let dir = tempfile::tempdir().unwrap();

        let mut location = test_location();
        location.internal_id = "nope".to_string();

        let err = download_dataset(
            &client,
            &location,
            "",
            &dir.path().join("x"),
            &quick_config(1),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TransferError::Submit(_)));
    }
}
