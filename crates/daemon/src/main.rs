use anyhow::Context;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod jobs;
mod llm;
mod media;
mod rate_limit;
mod tts;

use config::DaemonConfig;
use jobs::{sweeper::spawn_retention_sweeper, JobManager, JobProcessor};
use media::{FFmpegWrapper, FfmpegMixer, MusicLibrary, Transcoder, VideoComposer};
use tts::{ElevenLabsTts, FallbackSynthesizer, GoogleTts, SpeechBackend, VoiceDirectory};

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down, cancelling running jobs");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(DaemonConfig::from_env());
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;
    std::fs::create_dir_all(&config.music_dir)
        .with_context(|| format!("creating {}", config.music_dir.display()))?;
    info!(
        output_dir = %config.output_dir.display(),
        premium_tts = config.elevenlabs_api_key.is_some(),
        script_generation = config.gemini_api_key.is_some(),
        "Configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(config.timeouts.tts)
        .build()
        .context("building HTTP client")?;

    let transcoder: Arc<dyn Transcoder> = Arc::new(FFmpegWrapper);
    let composer = Arc::new(VideoComposer::new(
        transcoder.clone(),
        config.fps,
        config.timeouts.clone(),
    ));
    let mixer = Arc::new(FfmpegMixer::new(transcoder, config.timeouts.clone()));

    let elevenlabs = Arc::new(ElevenLabsTts::new(
        http.clone(),
        config.elevenlabs_api_key.clone(),
    ));
    let google = Arc::new(GoogleTts::new(http.clone()));
    // Premium first; the free engine accepts every request.
    let backends: Vec<Arc<dyn SpeechBackend>> = vec![elevenlabs.clone(), google.clone()];
    let speech = Arc::new(FallbackSynthesizer::new(backends));

    let music = MusicLibrary::new(config.music_dir.clone());
    let processor = Arc::new(JobProcessor::new(
        speech,
        mixer,
        composer.clone(),
        music.clone(),
        config.timeouts.narration,
    ));

    let shutdown = CancellationToken::new();
    let job_manager = Arc::new(JobManager::new(
        config.output_dir.clone(),
        processor,
        shutdown.clone(),
    ));
    let sweeper = spawn_retention_sweeper(
        job_manager.clone(),
        config.sweep_interval,
        config.retention,
        shutdown.clone(),
    );

    let state = api::AppState {
        config: config.clone(),
        jobs: job_manager,
        composer,
        gate: Arc::new(rate_limit::SubmissionGate::new(config.rate_limit_interval)),
        voices: Arc::new(VoiceDirectory::new(elevenlabs)),
        preview: google,
        scripts: Arc::new(llm::ScriptGenerator::new(http, config.gemini_api_key.clone())),
        music,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    let app = Router::new()
        .route("/health", get(api::health))
        .route_service("/", ServeFile::new(config.static_dir.join("index.html")))
        .nest("/api", api::router(state))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(cors);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    info!("Starting daemon server on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    sweeper.await?;
    info!("Daemon stopped");
    Ok(())
}
