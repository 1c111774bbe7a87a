//! Google Drive v3 implementation of [`StorageClient`].
//!
//! Three endpoints are used:
//!
//! ```text
//! GET   /files?q='<folder>' in parents and trashed = false   list (one page)
//! GET   /files/<id>?alt=media                                 download (chunked)
//! PATCH /files/<id>  {"name": …}                              rename
//! ```
//!
//! Every request carries a bearer token from the shared [`TokenProvider`].
//! `reqwest::Client` is internally reference-counted, so one `DriveClient`
//! can be shared by every worker.

use super::{FileRecord, Listing, RenamedFile, StorageClient};
use crate::auth::TokenProvider;
use crate::error::StorageError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, trace};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Drive v3 REST client.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    auth: Arc<TokenProvider>,
    base_url: String,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, auth: Arc<TokenProvider>) -> Self {
        Self {
            http,
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different endpoint (emulator, proxy).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.base_url, file_id)
    }

    async fn token(&self) -> Result<String, StorageError> {
        Ok(self.auth.access_token().await?)
    }
}

#[async_trait]
impl StorageClient for DriveClient {
    async fn list_children(&self, folder_id: &str, page_size: u32) -> Result<Listing, StorageError> {
        let token = self.token().await?;
        let query = children_query(folder_id);
        let page_size_param = page_size.to_string();
        debug!("Listing folder {} (page size {})", folder_id, page_size);

        let response = self
            .http
            .get(format!("{}/files", self.base_url))
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("pageSize", page_size_param.as_str()),
                ("fields", LIST_FIELDS),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(transport)?;

        let list: FileList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))?;

        Ok(Listing {
            truncated: list.next_page_token.is_some_and(|t| !t.is_empty()),
            files: list.files,
        })
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(transport)?;
        let mut response = check_status(response).await?;

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut chunks = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            chunks += 1;
            bytes.extend_from_slice(&chunk);
            trace!("File {}: chunk {} ({} bytes so far)", file_id, chunks, bytes.len());
        }
        debug!("File {}: downloaded {} bytes in {} chunks", file_id, bytes.len(), chunks);
        Ok(bytes)
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<RenamedFile, StorageError> {
        let token = self.token().await?;
        let response = self
            .http
            .patch(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("fields", "id, name"), ("supportsAllDrives", "true")])
            .json(&serde_json::json!({ "name": new_name }))
            .send()
            .await
            .map_err(transport)?;

        check_status(response)
            .await?
            .json::<RenamedFile>()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))
    }
}

/// Drive search query for the non-trashed direct children of a folder.
///
/// Single quotes and backslashes in the id are escaped as the query
/// language requires.
fn children_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}

fn transport(e: reqwest::Error) -> StorageError {
    StorageError::Transport(e.to_string())
}

/// Turn a non-2xx response into [`StorageError::Http`], preferring the
/// message from Drive's JSON error envelope.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Http {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
