//! Concurrent audio downloads.
//!
//! [`Dispatcher::dispatch`] spawns every task immediately; a semaphore caps
//! how many of them transfer at once. Handles are kept in a [`JoinSet`] and
//! collected by [`Dispatcher::join`] once the walk is over.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use driveaudio_core::DownloadTask;
use driveaudio_drive::{DriveApi, ProviderError};

use crate::error::{ClientError, ClientResult};
use crate::walker::{DispatchSink, DriveContext};

/// Totals for all joined downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Files written.
    pub completed: usize,
    /// Downloads that failed and wrote nothing.
    pub failed: usize,
    /// Bytes written across completed files.
    pub bytes: u64,
}

/// A fixed-size pool of download workers.
pub struct Dispatcher {
    api: Arc<dyn DriveApi>,
    permits: Arc<Semaphore>,
    chunk_size: u64,
    tasks: JoinSet<ClientResult<u64>>,
}

impl Dispatcher {
    /// Creates a pool running at most `workers` downloads at a time.
    pub fn new(ctx: &DriveContext, workers: usize, chunk_size: u64) -> Self {
        Self {
            api: Arc::clone(ctx.api()),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            chunk_size: chunk_size.max(1),
            tasks: JoinSet::new(),
        }
    }

    /// Submits a download without waiting for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch_download(&mut self, task: DownloadTask) {
        let api = Arc::clone(&self.api);
        let permits = Arc::clone(&self.permits);
        let chunk_size = self.chunk_size;

        debug!(file_id = %task.file_id, path = %task.target_path().display(), "queued download");
        self.tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ClientError::Task(format!("download pool closed: {}", e)))?;

            match download(api.as_ref(), &task, chunk_size).await {
                Ok(bytes) => {
                    info!(path = %task.target_path().display(), bytes, "downloaded");
                    Ok(bytes)
                }
                Err(e) => {
                    error!(
                        file_id = %task.file_id,
                        path = %task.target_path().display(),
                        "download failed: {}",
                        e
                    );
                    Err(e)
                }
            }
        });
    }

    /// Returns the number of downloads not yet joined.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every dispatched download.
    pub async fn join(mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(bytes)) => {
                    report.completed += 1;
                    report.bytes += bytes;
                }
                Ok(Err(_)) => report.failed += 1,
                Err(e) => {
                    error!("download task panicked or was cancelled: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl DispatchSink for Dispatcher {
    fn dispatch(&mut self, task: DownloadTask) {
        self.dispatch_download(task);
    }
}

/// Downloads one file in sequential ranged chunks, then writes it whole.
///
/// Nothing is written unless every chunk arrived. Failures are not retried.
pub async fn download(
    api: &dyn DriveApi,
    task: &DownloadTask,
    chunk_size: u64,
) -> ClientResult<u64> {
    let mut content: Vec<u8> = Vec::new();
    loop {
        let offset = content.len() as u64;
        let chunk = api
            .fetch_media_chunk(&task.file_id, offset, chunk_size)
            .await?;
        let received = offset + chunk.data.len() as u64;

        if chunk.data.is_empty() {
            if let Some(total) = chunk.total_size.filter(|total| received < *total) {
                return Err(ProviderError::invalid_response(format!(
                    "media for {} ended at {} of {} bytes",
                    task.file_id, received, total
                ))
                .into());
            }
        }

        let last = chunk.is_last(received);
        content.extend_from_slice(&chunk.data);
        debug!(file_id = %task.file_id, received, total = ?chunk.total_size, "chunk");
        if last {
            break;
        }
    }

    tokio::fs::write(task.target_path(), &content).await?;
    Ok(content.len() as u64)
}
