//! Depth-first traversal of a Drive folder tree.
//!
//! The walk pages through each folder one child at a time, recreates every
//! subfolder locally before descending into it, and hands each audio file to
//! a [`DispatchSink`]. Traversal uses an explicit stack of frames rather than
//! recursion, so deep trees cannot exhaust the call stack.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use driveaudio_core::{DownloadTask, DriveItem, MimeClass, PageResult};
use driveaudio_drive::{DriveApi, ProviderError, RetryPolicy, execute_with_retry};

use crate::error::ClientResult;

/// Shared Drive access for the walker and the download workers.
#[derive(Clone)]
pub struct DriveContext {
    api: Arc<dyn DriveApi>,
    retry: RetryPolicy,
}

impl DriveContext {
    /// Creates a context around a Drive implementation.
    pub fn new(api: Arc<dyn DriveApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Returns the Drive implementation.
    pub fn api(&self) -> &Arc<dyn DriveApi> {
        &self.api
    }

    /// Returns the retry policy for listing and metadata calls.
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<PageResult, ProviderError> {
        let api = self.api.as_ref();
        execute_with_retry(self.retry, || api.list_children(folder_id, page_token)).await
    }

    async fn item(&self, item_id: &str) -> Result<DriveItem, ProviderError> {
        let api = self.api.as_ref();
        execute_with_retry(self.retry, || api.get_item(item_id)).await
    }
}

impl std::fmt::Debug for DriveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveContext")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Receives audio files found during the walk.
///
/// `dispatch` must not wait for the download to finish.
pub trait DispatchSink {
    /// Hands off one download.
    fn dispatch(&mut self, task: DownloadTask);

    /// Called once a folder's last page and everything under it is done.
    fn end_of_folder(&mut self, _folder_id: &str) {}
}

/// Counters for a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Pages listed, empty ones included.
    pub pages: usize,
    /// Folders created (or found) locally.
    pub folders: usize,
    /// Audio files handed to the sink.
    pub dispatched: usize,
    /// Items that were neither folders nor audio, or had no usable name.
    pub skipped: usize,
}

/// Pending work on the walk stack.
#[derive(Debug)]
enum Frame {
    /// A page of one folder listing.
    Page {
        folder_id: String,
        destination: PathBuf,
        page_token: Option<String>,
    },
    /// Marks the end of a folder, popped after its last child's subtree.
    EndOfFolder { folder_id: String },
}

/// Walks a remote folder tree into a local directory.
pub struct Walker<'a, S> {
    ctx: &'a DriveContext,
    sink: &'a mut S,
    stats: WalkStats,
}

impl<'a, S: DispatchSink> Walker<'a, S> {
    /// Creates a walker that reports audio files to `sink`.
    pub fn new(ctx: &'a DriveContext, sink: &'a mut S) -> Self {
        Self {
            ctx,
            sink,
            stats: WalkStats::default(),
        }
    }

    /// Walks `folder_id`, recreating its subfolders under `destination`.
    ///
    /// Titles become local names through [`DriveItem::local_name`], so
    /// nothing is created outside `destination`. Items whose title has no
    /// usable name are skipped along with anything under them.
    ///
    /// # Errors
    ///
    /// Stops at the first listing or metadata call that fails after retries,
    /// at a page holding more than one child, or when a local directory
    /// cannot be created. Downloads already dispatched keep running.
    pub async fn walk(mut self, folder_id: &str, destination: &Path) -> ClientResult<WalkStats> {
        let mut stack = vec![Frame::Page {
            folder_id: folder_id.to_string(),
            destination: destination.to_path_buf(),
            page_token: None,
        }];

        while let Some(frame) = stack.pop() {
            let (folder_id, destination, page_token) = match frame {
                Frame::Page {
                    folder_id,
                    destination,
                    page_token,
                } => (folder_id, destination, page_token),
                Frame::EndOfFolder { folder_id } => {
                    info!(folder_id = %folder_id, "End of folder");
                    self.sink.end_of_folder(&folder_id);
                    continue;
                }
            };

            let page = self.ctx.list_page(&folder_id, page_token.as_deref()).await?;
            self.stats.pages += 1;

            let child_id = match page.child_ids.as_slice() {
                [] => {
                    info!("No files found.");
                    continue;
                }
                [child_id] => child_id.clone(),
                children => {
                    return Err(ProviderError::protocol_violation(format!(
                        "expected at most one child per page in folder {}, got {}",
                        folder_id,
                        children.len()
                    ))
                    .into());
                }
            };

            // the rest of this folder, or its end marker, runs after the child's subtree
            match page.next_page_token {
                Some(token) => stack.push(Frame::Page {
                    folder_id,
                    destination: destination.clone(),
                    page_token: Some(token),
                }),
                None => stack.push(Frame::EndOfFolder { folder_id }),
            }

            let item = self.ctx.item(&child_id).await?;
            let class = item.class();
            info!(kind = class.as_str(), "{}", item.title);

            let Some(name) = item.local_name() else {
                warn!(file_id = %item.id, title = %item.title, "no usable local name, skipping");
                self.stats.skipped += 1;
                continue;
            };

            match class {
                MimeClass::Folder => {
                    let subdir = destination.join(&name);
                    tokio::fs::create_dir_all(&subdir).await?;
                    debug!(path = %subdir.display(), "created folder");
                    self.stats.folders += 1;
                    stack.push(Frame::Page {
                        folder_id: item.id,
                        destination: subdir,
                        page_token: None,
                    });
                }
                MimeClass::Audio => {
                    self.sink.dispatch(DownloadTask::new(item.id, &destination, name));
                    self.stats.dispatched += 1;
                }
                MimeClass::Other => {
                    debug!(file_id = %item.id, mime_type = %item.mime_type, "skipping");
                    self.stats.skipped += 1;
                }
            }
        }

        Ok(self.stats)
    }
}
