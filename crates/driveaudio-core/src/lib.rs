//! Core types: drive items, pages, download tasks, tracing

pub mod item;
pub mod tracing;

pub use item::{DownloadTask, DriveItem, MimeClass, PageResult};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
