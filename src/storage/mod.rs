//! Cloud file storage seam.
//!
//! The pipeline only ever talks to storage through [`StorageClient`]: list a
//! folder once, download a file's bytes, rename a file. [`drive::DriveClient`]
//! implements it over the Google Drive v3 REST API; tests implement it in
//! memory.

pub mod drive;

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use drive::DriveClient;

/// Media-type prefix a file must carry to be analysed.
pub const IMAGE_MIME_PREFIX: &str = "image/";

/// Snapshot of a file taken at listing time. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl FileRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Whether the file should go through analysis at all.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with(IMAGE_MIME_PREFIX)
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub files: Vec<FileRecord>,
    /// The service reported further pages that were not fetched.
    pub truncated: bool,
}

/// What storage reports back after a rename.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenamedFile {
    pub id: String,
    pub name: String,
}

/// Storage operations the rename pipeline needs.
///
/// Implementations are shared by every worker at once and must be safe for
/// concurrent use.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Non-trashed files directly inside `folder_id`, a single page of at
    /// most `page_size` entries.
    async fn list_children(&self, folder_id: &str, page_size: u32) -> Result<Listing, StorageError>;

    /// Full content of the file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError>;

    /// Rename in place.
    async fn rename(&self, file_id: &str, new_name: &str) -> Result<RenamedFile, StorageError>;
}
