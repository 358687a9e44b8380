//! Request execution with transparent credential recovery
//!
//! Every remote operation in this crate is issued through [`resolve`] (or
//! [`resolve_raw`] for streamed payloads): a loop that re-sends the request
//! built by the caller's closure until the attempt is classified as
//! resolved. The only unresolved classification is an expired session
//! credential that was refreshed successfully; everything else, including a
//! body that cannot be decoded, is terminal.

use std::future::Future;

use serde_json::Value;
use tracing::{debug, error};

use crate::token::TokenCell;

/// Marker the platform places in structured error bodies when the bearer
/// token has expired.
const INACTIVE_TOKEN_MARKER: &str = "Inactive token";

/// How the caller wants a successful response body decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Bytes,
}

/// Decoded response content of one attempt.
#[derive(Debug)]
pub enum Payload {
    Json(Value),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Bytes(_) => None,
        }
    }

    /// Human-readable rendering, used when attaching server answers to
    /// failure messages.
    pub fn display(&self) -> String {
        match self {
            Payload::Json(value) => value.to_string(),
            Payload::Bytes(bytes) => String::from_utf8_lossy(bytes).to_string(),
        }
    }
}

/// Outcome of a single request attempt.
///
/// `resolved` means the caller must not retry; `error` distinguishes a
/// terminal failure from usable content. The unresolved non-error state is
/// produced only after a successful credential refresh.
#[derive(Debug)]
pub struct RequestOutcome {
    pub content: Payload,
    pub resolved: bool,
    pub error: bool,
}

impl RequestOutcome {
    fn resolved_ok(content: Payload) -> Self {
        RequestOutcome {
            content,
            resolved: true,
            error: false,
        }
    }

    fn terminal_error(content: Payload) -> Self {
        RequestOutcome {
            content,
            resolved: true,
            error: true,
        }
    }

    /// The server-supplied detail to attach to a failure report.
    pub fn failure_detail(&self) -> String {
        self.content.display()
    }
}

/// Re-issue the request built by `send` until the attempt resolves, then
/// hand back the still-unconsumed 2xx response for streaming.
///
/// Classification per attempt:
/// - 2xx: resolved, response returned to the caller.
/// - 404 or 5xx: terminal error, raw body attached (it may not be
///   well-formed).
/// - any other status with an "inactive token" error body: refresh the
///   shared credential; a successful refresh re-enters the loop so the next
///   attempt carries the new bearer token, a failed refresh is terminal.
/// - any other status with a different structured error body: terminal.
/// - any other status with an undecodable body: terminal, never retried.
pub async fn resolve_raw<F, Fut>(
    token: &TokenCell,
    op: &str,
    mut send: F,
) -> Result<reqwest::Response, RequestOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    loop {
        let response = match send().await {
            Ok(response) => response,
            Err(e) => {
                error!("{op} -- transport error: {e} -- FAILED");
                return Err(RequestOutcome::terminal_error(Payload::Bytes(
                    e.to_string().into_bytes(),
                )));
            }
        };

        let status = response.status();

        if status.is_success() {
            debug!("{op} -- OK");
            return Ok(response);
        }

        if status == reqwest::StatusCode::NOT_FOUND || status.is_server_error() {
            let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            error!("{op} -- bad request status: '{status}' -- FAILED");
            return Err(RequestOutcome::terminal_error(Payload::Bytes(body)));
        }

        // Remaining statuses are expected to carry a structured error body.
        let raw = response.text().await.unwrap_or_default();
        let body: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(_) => {
                error!("{op} -- error body can't be decoded -- FAILED");
                return Err(RequestOutcome::terminal_error(Payload::Bytes(
                    raw.into_bytes(),
                )));
            }
        };

        if body.get("errorString").and_then(Value::as_str) == Some(INACTIVE_TOKEN_MARKER) {
            error!("{op} -- token -- FAILED");
            if token.refresh().await {
                debug!("{op} -- refresh token -- OK");
                continue;
            }
            error!("{op} -- refresh token -- FAILED");
            return Err(RequestOutcome::terminal_error(Payload::Json(body)));
        }

        error!("{op} -- bad request status: '{status}' -- FAILED");
        return Err(RequestOutcome::terminal_error(Payload::Json(body)));
    }
}

/// [`resolve_raw`] plus body decoding: the everything-buffered form used by
/// every non-streaming operation.
pub async fn resolve<F, Fut>(token: &TokenCell, kind: BodyKind, op: &str, send: F) -> RequestOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    match resolve_raw(token, op, send).await {
        Ok(response) => decode_success(response, kind, op).await,
        Err(outcome) => outcome,
    }
}

async fn decode_success(response: reqwest::Response, kind: BodyKind, op: &str) -> RequestOutcome {
    match kind {
        BodyKind::Bytes => match response.bytes().await {
            Ok(bytes) => RequestOutcome::resolved_ok(Payload::Bytes(bytes.to_vec())),
            Err(e) => {
                error!("{op} -- reading response body failed: {e} -- FAILED");
                RequestOutcome::terminal_error(Payload::Bytes(e.to_string().into_bytes()))
            }
        },
        BodyKind::Json => {
            let raw = match response.text().await {
                Ok(raw) => raw,
                Err(e) => {
                    error!("{op} -- reading response body failed: {e} -- FAILED");
                    return RequestOutcome::terminal_error(Payload::Bytes(
                        e.to_string().into_bytes(),
                    ));
                }
            };

            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => RequestOutcome::resolved_ok(Payload::Json(value)),
                Err(_) => {
                    // Decode failures are terminal, never retried; looping
                    // against a malformed endpoint would not converge.
                    error!("{op} -- JSON response can't be decoded -- FAILED");
                    RequestOutcome::terminal_error(Payload::Bytes(raw.into_bytes()))
                }
            }
        }
    }
}
