//! Producer pipeline: capture -> encoder -> hub
//!
//! ```text
//!  [CaptureSource] ──read_frame()──► capture task ──write_all()──► encoder input
//!                                                                      │
//!                                                                  (ffmpeg)
//!                                                                      │
//!  [BroadcastHub] ◄──broadcast(chunk)── broadcast task ◄──read── encoder output
//! ```
//!
//! Shutdown runs in a fixed order: stop the capture source, let the encoder
//! flush what it has and close its output, then sweep the hub. When the
//! producer ends on its own (end of input, capture error, encoder exit) the
//! broadcast task runs the hub sweep itself, so every response body ends.

pub mod capture;
pub mod encoder;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::hub::{BroadcastHub, Chunk};
use crate::stats::{PipelineCounters, PipelineStats};

pub use capture::{CaptureSource, CommandCapture, ReaderCapture};
pub use encoder::{Encoder, EncoderConfig, EncoderIo, FfmpegEncoder, PassthroughEncoder};

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Largest chunk read from the encoder output per broadcast
    pub read_chunk_size: usize,

    /// Raw frame size requested from capture sources built by the caller
    pub capture_frame_size: usize,

    /// Time allowed for the encoder to flush and exit during shutdown
    pub flush_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,
            capture_frame_size: 4096,
            flush_timeout: Duration::from_secs(2),
        }
    }
}

impl PipelineConfig {
    /// Set the encoder output read size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Set the capture frame size
    pub fn capture_frame_size(mut self, size: usize) -> Self {
        self.capture_frame_size = size.max(1);
        self
    }

    /// Set the flush timeout
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }
}

/// Running producer pipeline
#[derive(Debug)]
pub struct Pipeline {
    hub: Arc<BroadcastHub>,
    config: PipelineConfig,
    stop_capture: CancellationToken,
    capture_task: Option<JoinHandle<Result<()>>>,
    broadcast_task: Option<JoinHandle<Result<()>>>,
    encoder_process: Option<Child>,
    counters: Arc<PipelineCounters>,
}

impl Pipeline {
    /// Start the encoder and the two producer tasks
    pub fn spawn<C, E>(
        capture: C,
        encoder: &E,
        hub: Arc<BroadcastHub>,
        config: PipelineConfig,
    ) -> Result<Self>
    where
        C: CaptureSource,
        E: Encoder + ?Sized,
    {
        let EncoderIo {
            input,
            output,
            process,
        } = encoder.start()?;

        let stop_capture = CancellationToken::new();
        let counters = Arc::new(PipelineCounters::default());

        let capture_task = tokio::spawn(run_capture(
            capture,
            input,
            stop_capture.clone(),
            Arc::clone(&counters),
        ));

        let broadcast_task = tokio::spawn(run_broadcast(
            output,
            Arc::clone(&hub),
            config.read_chunk_size,
            Arc::clone(&counters),
        ));

        tracing::info!(content_type = encoder.content_type(), "Pipeline started");

        Ok(Self {
            hub,
            config,
            stop_capture,
            capture_task: Some(capture_task),
            broadcast_task: Some(broadcast_task),
            encoder_process: process,
            counters,
        })
    }

    /// The hub this pipeline feeds
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Producer counters
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Whether the producer is still delivering chunks
    pub fn is_running(&self) -> bool {
        self.broadcast_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Wait for the producer to stop on its own
    ///
    /// Resolves when the encoder output ends, which happens after the capture
    /// source ends or fails, or the encoder dies. A capture source that is
    /// still live at that point is stopped. The hub has been swept by then.
    /// Returns the first producer failure, if any. Cancel-safe: dropping the
    /// future leaves the pipeline running.
    pub async fn wait(&mut self) -> Result<()> {
        let broadcast = match self.broadcast_task.as_mut() {
            Some(task) => flatten(task.await, Error::Encoder),
            None => return Ok(()),
        };
        self.broadcast_task = None;

        // Nothing reads the encoder any more; a live capture would only
        // run into the join timeout
        self.stop_capture.cancel();
        let capture = self.join_capture().await;
        let encoder = self.reap_encoder().await;
        self.hub.shutdown();

        capture.and(broadcast).and(encoder)
    }

    /// Ordered shutdown of the whole pipeline
    ///
    /// Stops the capture source, lets the encoder flush within the flush
    /// timeout, then closes every session. Idempotent.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Stopping capture");
        self.stop_capture.cancel();
        let capture = self.join_capture().await;

        // Encoder input is closed now; its output ends once it has flushed
        let flushed = match self.broadcast_task.take() {
            Some(mut task) => {
                match tokio::time::timeout(self.config.flush_timeout, &mut task).await {
                    Ok(joined) => flatten(joined, Error::Encoder),
                    Err(_) => {
                        tracing::warn!(
                            timeout_ms = self.config.flush_timeout.as_millis() as u64,
                            "Encoder did not flush in time"
                        );
                        task.abort();
                        Ok(())
                    }
                }
            }
            None => Ok(()),
        };

        let encoder = self.reap_encoder().await;
        let closed = self.hub.shutdown();
        tracing::info!(sessions = closed, "Pipeline stopped");

        capture.and(flushed).and(encoder)
    }

    async fn join_capture(&mut self) -> Result<()> {
        let Some(mut task) = self.capture_task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.config.flush_timeout, &mut task).await {
            Ok(joined) => flatten(joined, Error::Capture),
            Err(_) => {
                tracing::warn!("Capture task did not stop in time");
                task.abort();
                Ok(())
            }
        }
    }

    async fn reap_encoder(&mut self) -> Result<()> {
        let Some(mut child) = self.encoder_process.take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.config.flush_timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => {
                tracing::debug!("Encoder exited cleanly");
                Ok(())
            }
            Ok(Ok(status)) => Err(Error::Encoder(format!("encoder exited with {}", status))),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => {
                tracing::warn!("Encoder still running, killing it");
                let _ = child.kill().await;
                Ok(())
            }
        }
    }
}

/// Pump raw frames from the capture source into the encoder input
async fn run_capture<C>(
    mut capture: C,
    mut input: Box<dyn AsyncWrite + Send + Unpin>,
    stop: CancellationToken,
    counters: Arc<PipelineCounters>,
) -> Result<()>
where
    C: CaptureSource,
{
    let result = async {
        loop {
            let frame = tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(()),
                frame = capture.read_frame() => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("Capture source ended");
                    return Ok(());
                }
                Err(e) => return Err(Error::Capture(e.to_string())),
            };

            counters.frames_captured.fetch_add(1, Ordering::Relaxed);
            counters
                .bytes_captured
                .fetch_add(frame.len() as u64, Ordering::Relaxed);

            tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(()),
                written = input.write_all(&frame) => written.map_err(|e| {
                    Error::Encoder(format!("encoder input closed: {}", e))
                })?,
            }
        }
    }
    .await;

    capture.stop().await;
    // EOF on the encoder input makes it flush and close its output
    let _ = input.shutdown().await;

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Capture failed");
    }
    result
}

/// Read encoded chunks and hand them to the hub
async fn run_broadcast(
    output: Box<dyn AsyncRead + Send + Unpin>,
    hub: Arc<BroadcastHub>,
    chunk_size: usize,
    counters: Arc<PipelineCounters>,
) -> Result<()> {
    let mut chunks = ReaderStream::with_capacity(output, chunk_size);

    let result = loop {
        match chunks.next().await {
            Some(Ok(data)) => {
                counters.chunks_encoded.fetch_add(1, Ordering::Relaxed);
                counters
                    .bytes_encoded
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                hub.broadcast(Chunk::new(data));
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Encoder output failed");
                break Err(Error::Encoder(e.to_string()));
            }
            None => {
                tracing::info!("Encoder output ended");
                break Ok(());
            }
        }
    };

    // No more audio: end every response
    hub.shutdown();
    result
}

fn flatten(
    joined: std::result::Result<Result<()>, JoinError>,
    on_panic: fn(String) -> Error,
) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(on_panic(format!("task failed: {}", e))),
    }
}
