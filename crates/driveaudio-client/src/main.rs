//! driveaudio CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{debug, error, info};

use driveaudio_client::cli::Cli;
use driveaudio_client::config::ClientConfig;
use driveaudio_client::error::ClientResult;
use driveaudio_client::{Dispatcher, DriveContext, Walker};
use driveaudio_core::{TracingConfig, init_tracing};
use driveaudio_drive::google::{CredentialManager, DriveClient, OAuthClient};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(cli.log_format)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let started = Instant::now();
    match run(cli).await {
        Ok(()) => {
            println!("Downloading complete.");
            println!("Total time: {:.2?}", started.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) if e.is_missing_client_secret() => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let mut config = ClientConfig::resolve(cli.config.as_deref())?;
    config.apply_cli(&cli);
    config.validate()?;
    debug!(?config, "loaded configuration");

    let drive_config = config.drive_config();
    let oauth = OAuthClient::new(drive_config.timeout)?;
    let credential = CredentialManager::new(&drive_config, oauth)
        .into_shared()
        .await?;

    let client = DriveClient::new(Arc::new(credential), drive_config)?;
    let ctx = DriveContext::new(Arc::new(client), config.retry_policy());

    tokio::fs::create_dir_all(&cli.destination).await?;
    let workers = config.download.worker_count();
    info!(workers, destination = %cli.destination.display(), "starting walk");

    let mut dispatcher = Dispatcher::new(&ctx, workers, config.download.chunk_size);
    let walked = Walker::new(&ctx, &mut dispatcher)
        .walk(&cli.folder_id, &cli.destination)
        .await;

    // already dispatched downloads finish even if the walk failed
    let pending = dispatcher.pending();
    debug!(pending, "waiting for downloads");
    let report = dispatcher.join().await;
    info!(
        completed = report.completed,
        failed = report.failed,
        bytes = report.bytes,
        "downloads finished"
    );

    let stats = walked?;
    info!(
        pages = stats.pages,
        folders = stats.folders,
        dispatched = stats.dispatched,
        skipped = stats.skipped,
        "walk finished"
    );
    Ok(())
}
