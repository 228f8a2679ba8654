//! `ingest-upload` -- upload a CSV file and follow its processing job.
//!
//! Compresses the file, submits it to the backend, then logs every status
//! frame until the job completes or fails.
//!
//! # Environment variables
//!
//! | Variable             | Required | Default | Description                                  |
//! |----------------------|----------|---------|----------------------------------------------|
//! | `API_BASE_URL`       | yes      | --      | HTTP base, e.g. `http://localhost:8000/api`  |
//! | `WS_BASE_URL`        | yes      | --      | WebSocket base, e.g. `ws://localhost:8000/ws`|
//! | `RECONNECT_DELAY_MS` | no       | `3000`  | Delay before reconnecting a dropped stream   |
//! | `UPLOAD_EXTENSION`   | no       | `csv`   | Accepted file extension                      |
//!
//! Usage: `ingest-upload <file.csv>`

use std::path::PathBuf;

use anyhow::{bail, Context};
use ingest_client::UploadController;
use ingest_core::stream_state::ConnectionState;
use ingest_core::types::LogKind;
use ingest_core::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest_client=info,ingest_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let file: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: ingest-upload <file.csv>")?;

    let config = ClientConfig::from_env()?;
    tracing::info!(
        api = %config.http_base_url,
        ws = %config.stream_base_url,
        file = %file.display(),
        "Starting upload",
    );

    let mut controller = UploadController::new(config);
    let job = controller.upload(Some(&file)).await?;

    let Some(stream) = controller.stream() else {
        bail!("status stream for job {} was not started", job.id);
    };

    let mut updates = stream.subscribe();
    let mut printed = 0;
    loop {
        let state = updates.borrow_and_update().clone();
        for entry in state.logs().iter().skip(printed) {
            match entry.kind {
                LogKind::Error => tracing::error!(job_id = %job.id, "{}", entry.message),
                LogKind::System => tracing::debug!(job_id = %job.id, "{}", entry.message),
                _ => tracing::info!(
                    job_id = %job.id,
                    percentage = entry.percentage,
                    "{}",
                    entry.message,
                ),
            }
        }
        printed = state.logs().len();

        if state.is_finished() {
            break;
        }
        if updates.changed().await.is_err() {
            break;
        }
    }

    let view = controller.view();
    match view.status {
        ConnectionState::Complete => {
            tracing::info!(
                job_id = %job.id,
                processed = view.progress.processed,
                "Job complete",
            );
            Ok(())
        }
        status => bail!(
            "job {} ended in state {status}: {}",
            job.id,
            view.error.unwrap_or_else(|| "no error reported".into())
        ),
    }
}
