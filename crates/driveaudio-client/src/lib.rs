//! Walker, download pool and CLI plumbing for the `driveaudio` binary.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod walker;

pub use cli::Cli;
pub use dispatch::{DispatchReport, Dispatcher};
pub use error::{ClientError, ClientResult};
pub use walker::{DispatchSink, DriveContext, WalkStats, Walker};
