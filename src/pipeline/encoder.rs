//! Encoders
//!
//! The encoder is an opaque transform: raw PCM goes into `input`, a
//! streamable compressed format comes out of `output`. Chunks read from the
//! output are concatenable in order, which is all the hub relies on.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};

use crate::error::{Error, Result};

/// Running encoder
pub struct EncoderIo {
    /// Raw audio in
    pub input: Box<dyn AsyncWrite + Send + Unpin>,
    /// Encoded audio out
    pub output: Box<dyn AsyncRead + Send + Unpin>,
    /// Encoder process, if the encoder runs out of process
    pub process: Option<Child>,
}

impl std::fmt::Debug for EncoderIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderIo")
            .field("process", &self.process.as_ref().and_then(|p| p.id()))
            .finish_non_exhaustive()
    }
}

/// Something that turns raw audio bytes into a compressed stream
pub trait Encoder: Send + Sync + 'static {
    /// Start the encoder
    fn start(&self) -> Result<EncoderIo>;

    /// MIME type of the output stream
    fn content_type(&self) -> &'static str;

    /// Whether the output is a sequence of MPEG audio frames
    fn is_mpeg_audio(&self) -> bool {
        false
    }
}

/// Encoder settings
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: PathBuf,

    /// Raw input sample format (ffmpeg `-f`)
    pub input_format: String,

    /// Input sample rate in Hz
    pub sample_rate: u32,

    /// Input channel count
    pub channels: u8,

    /// Output audio codec
    pub codec: String,

    /// Output bitrate (ffmpeg syntax, e.g. "128k")
    pub bitrate: String,

    /// Output container format
    pub output_format: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            input_format: "s16le".into(),
            sample_rate: 44_100,
            channels: 2,
            codec: "libmp3lame".into(),
            bitrate: "128k".into(),
            output_format: "mp3".into(),
        }
    }
}

impl EncoderConfig {
    /// Set the ffmpeg binary
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Set the input sample rate
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the input channel count
    pub fn channels(mut self, channels: u8) -> Self {
        self.channels = channels;
        self
    }

    /// Set the output bitrate
    pub fn bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }

    /// Command line arguments for ffmpeg, reading stdin and writing stdout
    pub fn ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "warning".into(),
            "-f".into(),
            self.input_format.clone(),
            "-ar".into(),
            self.sample_rate.to_string(),
            "-ac".into(),
            self.channels.to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-c:a".into(),
            self.codec.clone(),
            "-b:a".into(),
            self.bitrate.clone(),
            "-f".into(),
            self.output_format.clone(),
            "pipe:1".into(),
        ]
    }

    /// MIME type for the configured output format
    pub fn content_type(&self) -> &'static str {
        match self.output_format.as_str() {
            "mp3" => "audio/mpeg",
            "adts" => "audio/aac",
            "ogg" => "audio/ogg",
            "flac" => "audio/flac",
            _ => "application/octet-stream",
        }
    }
}

/// Encoder running ffmpeg as a child process
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

impl Encoder for FfmpegEncoder {
    fn start(&self) -> Result<EncoderIo> {
        let args = self.config.ffmpeg_args();

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Encoder(format!(
                    "failed to spawn {}: {}",
                    self.config.ffmpeg_path.display(),
                    e
                ))
            })?;

        let input = child
            .stdin
            .take()
            .ok_or_else(|| Error::Encoder("ffmpeg stdin not captured".into()))?;
        let output = child
            .stdout
            .take()
            .ok_or_else(|| Error::Encoder("ffmpeg stdout not captured".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(target: "audiocast::ffmpeg", "{}", line);
                }
            });
        }

        tracing::info!(
            pid = ?child.id(),
            codec = %self.config.codec,
            bitrate = %self.config.bitrate,
            sample_rate = self.config.sample_rate,
            channels = self.config.channels,
            "Encoder started"
        );

        Ok(EncoderIo {
            input: Box::new(input),
            output: Box::new(output),
            process: Some(child),
        })
    }

    fn content_type(&self) -> &'static str {
        self.config.content_type()
    }

    fn is_mpeg_audio(&self) -> bool {
        self.config.output_format == "mp3"
    }
}

/// Identity encoder: output is exactly the input
///
/// For sources that already produce a compressed stream, and for tests.
#[derive(Debug, Clone)]
pub struct PassthroughEncoder {
    content_type: &'static str,
    buffer_size: usize,
}

impl PassthroughEncoder {
    pub fn new(content_type: &'static str) -> Self {
        Self {
            content_type,
            buffer_size: 64 * 1024,
        }
    }
}

impl Default for PassthroughEncoder {
    fn default() -> Self {
        Self::new("audio/mpeg")
    }
}

impl Encoder for PassthroughEncoder {
    fn start(&self) -> Result<EncoderIo> {
        let (input, output) = tokio::io::duplex(self.buffer_size);
        Ok(EncoderIo {
            input: Box::new(input),
            output: Box::new(output),
            process: None,
        })
    }

    fn content_type(&self) -> &'static str {
        self.content_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_default_ffmpeg_args() {
        let args = EncoderConfig::default().ffmpeg_args();
        let joined = args.join(" ");

        assert!(joined.contains("-f s16le -ar 44100 -ac 2 -i pipe:0"));
        assert!(joined.contains("-c:a libmp3lame -b:a 128k -f mp3 pipe:1"));
    }

    #[test]
    fn test_builder() {
        let config = EncoderConfig::default()
            .ffmpeg_path("/usr/local/bin/ffmpeg")
            .sample_rate(48_000)
            .channels(1)
            .bitrate("64k");

        let args = config.ffmpeg_args();
        assert!(args.contains(&"48000".to_string()));
        assert!(args.contains(&"64k".to_string()));
        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
    }

    #[test]
    fn test_content_type() {
        let mut config = EncoderConfig::default();
        assert_eq!(config.content_type(), "audio/mpeg");

        config.output_format = "ogg".into();
        assert_eq!(config.content_type(), "audio/ogg");

        config.output_format = "wav".into();
        assert_eq!(config.content_type(), "application/octet-stream");
    }

    #[test]
    fn test_ffmpeg_is_mpeg_audio() {
        assert!(FfmpegEncoder::default().is_mpeg_audio());
        assert!(!PassthroughEncoder::default().is_mpeg_audio());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_binary() {
        let encoder = FfmpegEncoder::new(
            EncoderConfig::default().ffmpeg_path("/nonexistent/audiocast-ffmpeg"),
        );

        let err = encoder.start().unwrap_err();
        assert!(matches!(err, Error::Encoder(_)));
    }

    #[tokio::test]
    async fn test_passthrough_roundtrip() {
        let encoder = PassthroughEncoder::new("audio/ogg");
        let EncoderIo {
            mut input,
            mut output,
            process,
        } = encoder.start().unwrap();
        assert!(process.is_none());

        input.write_all(b"OggS....").await.unwrap();
        input.shutdown().await.unwrap();
        drop(input);

        let mut out = Vec::new();
        output.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"OggS....");
        assert_eq!(encoder.content_type(), "audio/ogg");
    }
}
