//! audiocast server
//!
//! Reads raw PCM (s16le) from stdin or from `AUDIOCAST_CAPTURE_COMMAND`,
//! encodes it with ffmpeg and serves it at `http://HOST:PORT/stream`.
//!
//! ```text
//! arecord -q -f S16_LE -r 44100 -c 2 -t raw | audiocast
//! AUDIOCAST_CAPTURE_COMMAND="arecord -q -D hw:1 -f S16_LE -r 44100 -c 2 -t raw" audiocast
//! ```
//!
//! Stdin is read on a blocking thread. After Ctrl+C the process cannot exit
//! until that read returns, so an idle pipe can hold it open until the writer
//! sends more data or closes. Prefer `AUDIOCAST_CAPTURE_COMMAND` for capture
//! devices; the child is killed on shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use audiocast::pipeline::{CommandCapture, Encoder, FfmpegEncoder, Pipeline, ReaderCapture};
use audiocast::{AppConfig, BroadcastHub, Error, Result, StreamServer};

#[tokio::main]
async fn main() -> ExitCode {
    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into()))
        .init();

    if let Some(e) = load_error {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "audiocast stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let encoder = FfmpegEncoder::new(config.encoder_config());
    let hub = Arc::new(BroadcastHub::with_config(
        config.hub_config(encoder.is_mpeg_audio())?,
    ));
    let server_config = config.server_config(encoder.content_type())?;
    let pipeline_config = config.pipeline_config();
    let frame_size = pipeline_config.capture_frame_size;

    // Bind before starting capture so a busy port fails fast
    let listener = TcpListener::bind(server_config.bind_addr).await?;

    let mut pipeline = match config.capture_command {
        Some(ref command) => {
            let capture = CommandCapture::spawn(command, frame_size)
                .map_err(|e| Error::Capture(format!("{}: {}", command, e)))?;
            Pipeline::spawn(capture, &encoder, Arc::clone(&hub), pipeline_config)?
        }
        None => {
            info!("Reading raw audio from stdin");
            let capture = ReaderCapture::stdin(frame_size);
            Pipeline::spawn(capture, &encoder, Arc::clone(&hub), pipeline_config)?
        }
    };

    let server = StreamServer::new(server_config, Arc::clone(&hub));
    let server_stop = CancellationToken::new();
    let stop = server_stop.clone();
    let mut server_task = tokio::spawn(async move {
        server
            .serve(listener, async move { stop.cancelled().await })
            .await
    });

    let (outcome, server_done) = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            (Ok(()), false)
        }
        result = pipeline.wait() => {
            info!("Producer stopped");
            (result, false)
        }
        joined = &mut server_task => {
            error!("Server exited unexpectedly");
            (flatten(joined), true)
        }
    };

    // Ends every open stream, so the graceful server stop below can finish
    let stopped = pipeline.shutdown().await;

    server_stop.cancel();
    let served = if server_done {
        Ok(())
    } else {
        flatten(server_task.await)
    };

    let stats = hub.stats();
    info!(
        total_sessions = stats.total_sessions,
        bytes_broadcast = stats.bytes_broadcast,
        bitrate = stats.bitrate(),
        "Shutdown complete"
    );

    outcome.and(stopped).and(served)
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|e| Error::Server(e.to_string()))?
}
