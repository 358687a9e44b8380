//! Thread-blocking driver for the upload state machine
//!
//! Same session semantics as [`crate::tus::uploader::Uploader`] with the
//! network call and the inter-retry delay blocking the calling thread
//! instead of suspending a task. The state machine is not duplicated; this
//! type drives the suspending implementation to completion on an owned
//! single-threaded runtime.

use tokio::runtime::Runtime;

use crate::callback::TransferCallback;
use crate::error::TransferError;
use crate::tus::uploader::{ChunkExchange, UploadState, Uploader};
use url::Url;

/// Blocking wrapper around an [`Uploader`].
pub struct BlockingUploader<E: ChunkExchange> {
    runtime: Runtime,
    inner: Uploader<E>,
}

impl<E: ChunkExchange> BlockingUploader<E> {
    pub fn new(inner: Uploader<E>) -> Result<Self, TransferError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(BlockingUploader { runtime, inner })
    }

    /// Perform the upload, blocking the calling thread until the target
    /// offset is reached or a terminal failure occurs.
    pub fn upload(
        &mut self,
        stop_at: Option<u64>,
        progress: Option<&TransferCallback>,
    ) -> Result<(), TransferError> {
        self.runtime.block_on(self.inner.upload(stop_at, progress))
    }

    pub fn offset(&self) -> u64 {
        self.inner.offset()
    }

    pub fn state(&self) -> UploadState {
        self.inner.state()
    }

    pub fn resource(&self) -> Option<&Url> {
        self.inner.resource()
    }

    /// Hand the session back to the suspending driver.
    pub fn into_inner(self) -> Uploader<E> {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use httpmock::prelude::*;
    use httpmock::Method;

    use crate::client::BaseClient;
    use crate::token::TokenCell;
    use crate::tus::metadata::UploadMetadata;
    use crate::tus::uploader::HttpExchange;

    use super::*;

    #[test]
    fn test_blocking_upload_matches_suspending_semantics() {
        let server = MockServer::start();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"block-me").unwrap();
        file.flush().unwrap();

        let create = server.mock(|when, then| {
            when.method(POST).path("/files/");
            then.status(201).header("Location", "/files/blocking");
        });

        let patch = server.mock(|when, then| {
            when.method(Method::PATCH)
                .path("/files/blocking")
                .header("Upload-Offset", "0");
            then.status(204).header("Upload-Offset", "8");
        });

        let client =
            BaseClient::new(&server.base_url(), None, TokenCell::fixed("t")).unwrap();
        let endpoint = Url::parse(&server.url("/files/")).unwrap();

        let inner = Uploader::new(
            HttpExchange::new(&client),
            endpoint,
            file.path(),
            UploadMetadata::new(),
        )
        .with_chunk_size(16);

        let mut uploader = BlockingUploader::new(inner).unwrap();
        uploader.upload(None, None).unwrap();

        create.assert_hits(1);
        patch.assert_hits(1);
        assert_eq!(uploader.offset(), 8);
        assert_eq!(uploader.state(), UploadState::Complete);
    }
}
