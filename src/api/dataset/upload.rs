//! Upload session factory
//!
//! Binds a [`crate::tus::uploader::Uploader`] to the platform's resumable
//! upload endpoint, attaching the structured session metadata (target
//! location, ownership, expand/encryption flags and the descriptive
//! metadata blob) the ingest pipeline reads from the create-resource
//! request.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::api::dataset::create::DatasetMetadata;
use crate::client::BaseClient;
use crate::location::AccessScope;
use crate::tus::metadata::UploadMetadata;
use crate::tus::uploader::{HttpExchange, Uploader, DEFAULT_CHUNK_SIZE};
use crate::utils::ensure_internal_uuid;

/// Upload endpoint below the API base URL.
pub const UPLOAD_ENDPOINT: &str = "transfer/upload/";

/// Archives with this suffix are unpacked by the ingest pipeline.
const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Target description for an upload that creates a new dataset.
#[derive(Debug, Clone)]
pub struct NewDatasetUpload {
    pub access: AccessScope,
    pub project: String,
    /// Storage zone; the session default when `None`.
    pub zone: Option<String>,
    /// Path inside the dataset the file lands at, empty for the root.
    pub dataset_path: String,
    /// Username recorded as the owner of the ingested data.
    pub owner_user: String,
    pub encryption: bool,
    pub metadata: DatasetMetadata,
}

/// Target description for an upload into an existing dataset. Files already
/// present at the same path are rewritten.
#[derive(Debug, Clone)]
pub struct RewriteUpload {
    pub internal_id: String,
    /// Title of the existing dataset.
    pub title: String,
    pub access: AccessScope,
    pub project: String,
    pub zone: Option<String>,
    pub dataset_path: String,
    pub encryption: bool,
}

/// Builds an uploader that creates a new dataset around the file.
pub async fn upload_new(
    client: &BaseClient,
    file_path: impl Into<PathBuf>,
    params: NewDatasetUpload,
) -> Result<Uploader<HttpExchange>, String> {
    let file_path = file_path.into();
    let filename = file_name_of(&file_path)?;
    let zone = params
        .zone
        .as_deref()
        .unwrap_or_else(|| client.zone())
        .to_string();
    let descriptive =
        serde_json::to_string(&params.metadata).map_err(|e| e.to_string())?;

    let metadata = UploadMetadata::new()
        .with("path", params.dataset_path)
        .with("zone", zone)
        .with("filename", filename.clone())
        .with("user", params.owner_user)
        .with("project", params.project)
        .with("access", params.access.to_string())
        .with("expand", expand_flag(&filename))
        .with("encryption", yes_no(params.encryption))
        .with("metadata", descriptive);

    build_uploader(client, file_path, metadata).await
}

/// Builds an uploader that pushes the file into an existing dataset.
pub async fn upload_rewrite(
    client: &BaseClient,
    file_path: impl Into<PathBuf>,
    params: RewriteUpload,
) -> Result<Uploader<HttpExchange>, String> {
    ensure_internal_uuid(&params.internal_id)?;

    let file_path = file_path.into();
    let filename = file_name_of(&file_path)?;
    let zone = params
        .zone
        .as_deref()
        .unwrap_or_else(|| client.zone())
        .to_string();
    let descriptive = serde_json::to_string(&serde_json::json!({ "title": params.title }))
        .map_err(|e| e.to_string())?;

    let metadata = UploadMetadata::new()
        .with("internal_id", params.internal_id)
        .with("path", params.dataset_path)
        .with("zone", zone)
        .with("filename", filename.clone())
        .with("project", params.project)
        .with("access", params.access.to_string())
        .with("expand", expand_flag(&filename))
        .with("encryption", yes_no(params.encryption))
        .with("metadata", descriptive);

    build_uploader(client, file_path, metadata).await
}

async fn build_uploader(
    client: &BaseClient,
    file_path: PathBuf,
    metadata: UploadMetadata,
) -> Result<Uploader<HttpExchange>, String> {
    // The upload endpoint cannot signal an expired token mid-stream, so the
    // credential is renewed before the session starts.
    if !client.token().ensure_fresh().await {
        return Err("session credential expired and could not be renewed".to_string());
    }

    let endpoint = client
        .base_url()
        .join(UPLOAD_ENDPOINT)
        .map_err(|e| e.to_string())?;

    debug!(
        "initialising resumable upload of {} against {endpoint}",
        file_path.display()
    );

    Ok(
        Uploader::new(HttpExchange::new(client), endpoint, file_path, metadata)
            .with_chunk_size(DEFAULT_CHUNK_SIZE),
    )
}

fn expand_flag(filename: &str) -> &'static str {
    if filename.ends_with(ARCHIVE_SUFFIX) {
        "yes"
    } else {
        "no"
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn file_name_of(path: &Path) -> Result<String, String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("'{}' has no usable file name", path.display()))
}
