//! Resumable chunked upload engine
//!
//! One [`Uploader`] owns the transfer of one local file to one resumable
//! upload endpoint. The remote resource is created lazily on the first chunk
//! and exactly once; afterwards the uploader sends strictly sequential chunk
//! transmissions, adopting the server-reported cumulative offset after every
//! exchange. A failed transmission is retried a bounded number of times with
//! a fixed delay, re-querying the authoritative offset before each resend so
//! bytes the server already accepted are never sent again.
//!
//! The network side sits behind [`ChunkExchange`] so the same state machine
//! serves both the suspending driver here and the thread-blocking driver in
//! [`crate::tus::blocking`].

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error};
use url::Url;

use crate::callback::TransferCallback;
use crate::client::BaseClient;
use crate::error::TransferError;
use crate::token::TokenCell;
use crate::tus::metadata::UploadMetadata;

/// Protocol revision sent with every exchange.
pub const TUS_VERSION: &str = "1.0.0";

/// Default chunk size of 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1_048_576;

/// Default bounded retry budget per chunk.
pub const DEFAULT_CHUNK_RETRIES: u32 = 3;

/// Default delay between chunk retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle of one upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    NotStarted,
    ResourceCreated,
    Uploading,
    Complete,
    Failed,
}

/// Capability to perform the three wire exchanges of the resumable
/// protocol. Implementations carry their own credentials.
#[async_trait]
pub trait ChunkExchange: Send + Sync {
    /// Create the remote upload resource; the returned URL receives all
    /// subsequent chunks.
    async fn create(
        &self,
        endpoint: &Url,
        length: u64,
        metadata: &UploadMetadata,
    ) -> Result<Url, TransferError>;

    /// Transmit one chunk starting at `offset`, returning the server's new
    /// cumulative offset.
    async fn transmit(
        &self,
        resource: &Url,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<u64, TransferError>;

    /// Query the authoritative current offset of the resource.
    async fn offset(&self, resource: &Url) -> Result<u64, TransferError>;
}

/// [`ChunkExchange`] over HTTP: POST to create, PATCH with offset headers to
/// transmit, HEAD to re-query the offset.
pub struct HttpExchange {
    http: reqwest::Client,
    token: TokenCell,
}

impl HttpExchange {
    pub fn new(client: &BaseClient) -> Self {
        HttpExchange {
            http: client.http().clone(),
            token: client.token().clone(),
        }
    }

    async fn bearer(&self) -> String {
        format!("Bearer {}", self.token.access_token().await)
    }
}

#[async_trait]
impl ChunkExchange for HttpExchange {
    async fn create(
        &self,
        endpoint: &Url,
        length: u64,
        metadata: &UploadMetadata,
    ) -> Result<Url, TransferError> {
        let mut request = self
            .http
            .post(endpoint.clone())
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Length", length.to_string())
            .header("Authorization", self.bearer().await);

        if !metadata.is_empty() {
            request = request.header("Upload-Metadata", metadata.encode_header());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransferError::CreateResource(e.to_string()))?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match location {
            Some(location) => endpoint
                .join(&location)
                .map_err(|e| TransferError::CreateResource(e.to_string())),
            None => Err(TransferError::CreateResource(format!(
                "attempt to create upload resource answered status {status} without a location"
            ))),
        }
    }

    async fn transmit(
        &self,
        resource: &Url,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<u64, TransferError> {
        let response = self
            .http
            .patch(resource.clone())
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Offset", offset.to_string())
            .header("Content-Type", "application/offset+octet-stream")
            .header("Authorization", self.bearer().await)
            .body(chunk)
            .send()
            .await
            .map_err(|e| TransferError::Chunk {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Chunk {
                status: Some(status.as_u16()),
                body,
            });
        }

        parse_offset_header(&response).ok_or_else(|| TransferError::Chunk {
            status: Some(status.as_u16()),
            body: "response carries no Upload-Offset header".to_string(),
        })
    }

    async fn offset(&self, resource: &Url) -> Result<u64, TransferError> {
        let response = self
            .http
            .head(resource.clone())
            .header("Tus-Resumable", TUS_VERSION)
            .header("Authorization", self.bearer().await)
            .send()
            .await
            .map_err(|e| TransferError::Chunk {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        parse_offset_header(&response).ok_or_else(|| TransferError::Chunk {
            status: Some(status.as_u16()),
            body: "offset query carries no Upload-Offset header".to_string(),
        })
    }
}

fn parse_offset_header(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("Upload-Offset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// The upload session state machine.
pub struct Uploader<E: ChunkExchange> {
    exchange: E,
    endpoint: Url,
    file_path: PathBuf,
    metadata: UploadMetadata,
    chunk_size: u64,
    retries: u32,
    retry_delay: Duration,
    resource: Option<Url>,
    offset: u64,
    stop_at: u64,
    state: UploadState,
}

impl<E: ChunkExchange> Uploader<E> {
    pub fn new(
        exchange: E,
        endpoint: Url,
        file_path: impl Into<PathBuf>,
        metadata: UploadMetadata,
    ) -> Self {
        Uploader {
            exchange,
            endpoint,
            file_path: file_path.into(),
            metadata,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retries: DEFAULT_CHUNK_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            resource: None,
            offset: 0,
            stop_at: 0,
            state: UploadState::NotStarted,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_retries(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Bytes acknowledged by the server so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// The remote resource URL, once created.
    pub fn resource(&self) -> Option<&Url> {
        self.resource.as_ref()
    }

    /// The session metadata sent with the create-resource request.
    pub fn metadata(&self) -> &UploadMetadata {
        &self.metadata
    }

    /// Perform the upload.
    ///
    /// Transmits chunks until the server-acknowledged offset reaches
    /// `stop_at` (the file size when not given). Progress is reported once
    /// per chunk as (acknowledged bytes, target size).
    pub async fn upload(
        &mut self,
        stop_at: Option<u64>,
        progress: Option<&TransferCallback>,
    ) -> Result<(), TransferError> {
        let file_size = tokio::fs::metadata(&self.file_path).await?.len();
        self.stop_at = stop_at.unwrap_or(file_size).min(file_size);

        while self.offset < self.stop_at {
            if let Err(e) = self.upload_chunk().await {
                self.state = UploadState::Failed;
                return Err(e);
            }

            if let Some(callback) = progress {
                callback.call(self.offset.min(self.stop_at), self.stop_at);
            }
        }

        self.state = UploadState::Complete;
        debug!(
            "upload reached the requested stop offset of {} bytes",
            self.stop_at
        );
        Ok(())
    }

    /// Create the remote resource if this session does not know one yet.
    /// A second call reuses the stored URL and issues nothing.
    pub async fn ensure_resource(&mut self) -> Result<(), TransferError> {
        if self.resource.is_some() {
            return Ok(());
        }

        let length = tokio::fs::metadata(&self.file_path).await?.len();
        let created = self
            .exchange
            .create(&self.endpoint, length, &self.metadata)
            .await;

        match created {
            Ok(url) => {
                debug!("upload resource created at {url}");
                self.resource = Some(url);
                self.offset = 0;
                self.state = UploadState::ResourceCreated;
                Ok(())
            }
            Err(e) => {
                self.state = UploadState::Failed;
                Err(e)
            }
        }
    }

    /// Transmit exactly one chunk, retrying transient failures.
    async fn upload_chunk(&mut self) -> Result<(), TransferError> {
        self.ensure_resource().await?;
        let resource = self
            .resource
            .clone()
            .expect("resource exists after ensure_resource");

        let mut attempt: u32 = 0;
        let mut pending_error: Option<TransferError> = None;

        loop {
            if let Some(err) = pending_error.take() {
                if attempt >= self.retries {
                    error!("chunk upload gave up after {attempt} retries");
                    return Err(err);
                }
                attempt += 1;
                tokio::time::sleep(self.retry_delay).await;

                // The failure may have happened after the server accepted
                // part of the chunk; resync to its offset before resending.
                match self.exchange.offset(&resource).await {
                    Ok(offset) => self.offset = offset,
                    Err(e) => {
                        pending_error = Some(e);
                        continue;
                    }
                }
            }

            let chunk = self.read_chunk().await?;
            match self.exchange.transmit(&resource, self.offset, chunk).await {
                Ok(server_offset) => {
                    // Adopt the server's cumulative offset verbatim; local
                    // arithmetic would drift on partial writes.
                    self.offset = server_offset;
                    self.state = UploadState::Uploading;
                    debug!("{} bytes uploaded ...", self.offset);
                    return Ok(());
                }
                Err(e) => pending_error = Some(e),
            }
        }
    }

    /// Read the next chunk from the current offset, bounded by the chunk
    /// size and the stop offset.
    async fn read_chunk(&self) -> Result<Vec<u8>, TransferError> {
        let want = self
            .chunk_size
            .min(self.stop_at.saturating_sub(self.offset)) as usize;

        let mut file = File::open(&self.file_path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut buffer = vec![0u8; want];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = file.read(&mut buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer.truncate(filled);

        Ok(buffer)
    }
}
