//! DriveApi trait definition.
//!
//! [`DriveApi`] is the seam between the walker/downloader and Google Drive.
//! The HTTP implementation lives in [`crate::google::DriveClient`]; tests
//! substitute in-memory trees.

use std::future::Future;
use std::pin::Pin;

use driveaudio_core::{DriveItem, PageResult};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the walker and the download
/// workers can share one `Arc<dyn DriveApi>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One ranged slice of a file's media content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaChunk {
    /// The bytes returned for the requested range.
    pub data: Vec<u8>,
    /// Total size of the file, when the server reported it.
    pub total_size: Option<u64>,
}

impl MediaChunk {
    /// Creates a chunk with a known total size.
    pub fn new(data: Vec<u8>, total_size: Option<u64>) -> Self {
        Self { data, total_size }
    }

    /// Returns true once `received` bytes cover the whole file.
    ///
    /// An unknown total means the server sent everything in one response.
    pub fn is_last(&self, received: u64) -> bool {
        match self.total_size {
            Some(total) => received >= total || self.data.is_empty(),
            None => true,
        }
    }
}

/// Read-only access to a Drive folder tree.
///
/// Every method performs exactly one remote call; callers decide whether to
/// wrap it in [`execute_with_retry`](crate::retry::execute_with_retry).
pub trait DriveApi: Send + Sync {
    /// Lists one page of children of `folder_id`.
    ///
    /// Pages hold at most one child and are ordered with folders first.
    fn list_children<'a>(
        &'a self,
        folder_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<PageResult>>;

    /// Fetches the metadata (title, MIME type, parents) of one item.
    fn get_item<'a>(&'a self, item_id: &'a str) -> BoxFuture<'a, ProviderResult<DriveItem>>;

    /// Fetches `len` bytes of a file's media content starting at `offset`.
    fn fetch_media_chunk<'a>(
        &'a self,
        file_id: &'a str,
        offset: u64,
        len: u64,
    ) -> BoxFuture<'a, ProviderResult<MediaChunk>>;
}
