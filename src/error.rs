use thiserror::Error;

/// Failures raised by the transfer engine (resumable uploads and staged
/// downloads), tagged by the phase that produced them so callers can report
/// which step of a transfer went wrong.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The server did not hand back an upload resource location.
    #[error("creating the upload resource failed: {0}")]
    CreateResource(String),

    /// A chunk transmission failed after all retries. Carries the last
    /// response's status and body when the server answered at all.
    #[error("chunk upload failed{}: {body}", fmt_status(status))]
    Chunk {
        status: Option<u16>,
        body: String,
    },

    /// Submitting the download-preparation job failed or returned no
    /// request id.
    #[error("submitting the download request failed: {0}")]
    Submit(String),

    /// Checking the preparation job's status failed outright.
    #[error("checking the download status failed: {0}")]
    Poll(String),

    /// The server reported the download-preparation job as failed.
    #[error("download preparation failed: {reason}")]
    JobFailed { reason: String },

    /// The job never reached a terminal state within the retry budget.
    /// Distinct from [`TransferError::JobFailed`]: there is no server
    /// reason to attach.
    #[error("download not ready after {attempts} status checks, giving up")]
    PollTimeout { attempts: u32 },

    /// Fetching the prepared payload failed.
    #[error("fetching the prepared download failed: {0}")]
    Fetch(String),

    /// A response body could not be decoded as the expected shape.
    #[error("response body could not be decoded: {0}")]
    Decode(String),

    /// Writing the downloaded payload to local storage failed. The
    /// partially written destination file is left in place.
    #[error("writing the download to disk failed: {0}")]
    Io(#[from] std::io::Error),

    /// The session credential could not be refreshed.
    #[error("credential refresh failed: {0}")]
    Credential(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" with status {status}"),
        None => String::new(),
    }
}
