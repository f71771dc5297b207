//! Relay an already encoded MP3 stream from stdin to HTTP listeners
//!
//! Run with: cargo run --example pipe_server [BIND_ADDR]
//!
//! Examples:
//!   ffmpeg -re -i song.mp3 -c copy -f mp3 - | cargo run --example pipe_server
//!   ffmpeg -re -f lavfi -i sine=f=440 -f mp3 - | cargo run --example pipe_server 127.0.0.1:8000
//!
//! Then open http://localhost:8080/ in a browser, or:
//!   ffplay http://localhost:8080/stream
//!   curl -s http://localhost:8080/stats

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use audiocast::pipeline::{PassthroughEncoder, Pipeline, PipelineConfig, ReaderCapture};
use audiocast::{BroadcastHub, HubConfig, ServerConfig, StreamServer};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("audiocast=debug".parse()?),
        )
        .init();

    let addr: SocketAddr = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => "0.0.0.0:8080".parse()?,
    };

    // Input is already MP3, so late joiners can start on a frame boundary
    let hub = Arc::new(BroadcastHub::with_config(
        HubConfig::default()
            .queue_capacity(128)
            .write_timeout(Duration::from_secs(5))
            .align_first_frame(true),
    ));

    let mut pipeline = Pipeline::spawn(
        ReaderCapture::stdin(4096),
        &PassthroughEncoder::default(),
        Arc::clone(&hub),
        PipelineConfig::default(),
    )?;

    let server = StreamServer::new(ServerConfig::with_addr(addr), Arc::clone(&hub));
    let stop = CancellationToken::new();
    let server_stop = stop.clone();
    let server_task = tokio::spawn(async move {
        server
            .run_until(async move { server_stop.cancelled().await })
            .await
    });

    println!("Relaying stdin on http://{}/stream", addr);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => println!("Interrupted"),
        result = pipeline.wait() => println!("Input ended: {:?}", result),
    }

    pipeline.shutdown().await?;
    stop.cancel();
    server_task.await??;

    let stats = hub.stats();
    println!(
        "Served {} listeners, {} bytes broadcast",
        stats.total_sessions, stats.bytes_broadcast
    );

    Ok(())
}
