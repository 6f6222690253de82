//! Google Drive access for driveaudio.
//!
//! - [`DriveApi`] - the three remote calls the walker and downloader need
//! - [`execute_with_retry`] - fixed-delay retry of HTTP failures
//! - [`ProviderError`] - error type for everything that talks to Drive
//! - [`google`] - the HTTP client and OAuth credential handling

pub mod api;
pub mod error;
pub mod google;
pub mod retry;

pub use api::{BoxFuture, DriveApi, MediaChunk};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use retry::{RetryPolicy, execute_with_retry};
