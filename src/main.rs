use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use meetnotes::audio::{CaptureConfig, DeviceBackendFactory, MixerConfig, RecorderConfig};
use meetnotes::http::{create_router, AppState};
use meetnotes::session::SessionDriver;
use meetnotes::storage::ArtifactStore;
use meetnotes::summarize::{HttpSummaryProvider, SummarizationOrchestrator};
use meetnotes::transcribe::{HttpTranscriptionProvider, TranscriptionOrchestrator};
use meetnotes::Config;

/// Meeting recorder: captures microphone and system audio, transcribes
/// the recording, and writes paired transcript/summary notes.
#[derive(Parser, Debug)]
#[command(name = "meetnotes", version)]
struct Args {
    /// Path to a config file (TOML); defaults are used when absent
    #[arg(long)]
    config: Option<String>,

    /// Address for the control API to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port for the control API
    #[arg(long)]
    port: Option<u16>,

    /// Directory for transcript and summary files
    #[arg(long)]
    notes_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    config.validate();

    let bind = args.bind.unwrap_or_else(|| config.service.http.bind.clone());
    let port = args.port.unwrap_or(config.service.http.port);
    let notes_dir = args.notes_dir.unwrap_or_else(|| config.storage.notes_dir());

    info!("meetnotes starting");
    info!("Notes directory: {}", notes_dir.display());

    let factory = Arc::new(DeviceBackendFactory::new(CaptureConfig {
        target_sample_rate: config.audio.sample_rate,
        buffer_duration_ms: config.audio.frame_duration_ms,
    }));
    let transcriber = TranscriptionOrchestrator::new(Arc::new(HttpTranscriptionProvider::new(
        &config.transcription,
    )));
    let summarizer = SummarizationOrchestrator::new(Arc::new(HttpSummaryProvider::new(
        &config.summarization,
    )));
    let store = ArtifactStore::new(notes_dir);

    let driver = Arc::new(SessionDriver::new(
        factory,
        transcriber,
        summarizer,
        store,
        MixerConfig {
            sample_rate: config.audio.sample_rate,
            max_lag_frames: config.audio.max_lag_frames,
        },
        RecorderConfig {
            flush_interval_secs: config.audio.flush_interval_secs,
        },
    ));

    let app = create_router(AppState::new(Arc::clone(&driver)));
    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Control API listening on http://{}:{}", bind, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(driver))
        .await
        .context("HTTP server error")?;

    Ok(())
}

/// Resolves on ctrl-c and cancels any in-flight session work
async fn shutdown_signal(driver: Arc<SessionDriver>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown requested, cancelling in-flight work");
    driver.shutdown();
}
