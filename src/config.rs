//! Application configuration
//!
//! Loaded from `AUDIOCAST_*` environment variables, optionally seeded from an
//! `app.env` or `.env` file, then split into the per-component configs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::hub::{HubConfig, OverflowPolicy};
use crate::pipeline::{EncoderConfig, PipelineConfig};
use crate::server::ServerConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "AUDIOCAST_";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Chunks buffered per listener
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// What to do when a listener's queue is full
    #[serde(default = "default_overflow_policy")]
    pub overflow_policy: String,

    /// Maximum concurrent listeners (0 = unlimited)
    #[serde(default)]
    pub max_sessions: usize,

    /// Per-write deadline for a listener's socket
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Start new listeners on an MPEG frame boundary when the output is MP3
    ///
    /// Off by default: alignment trims the leading bytes of a listener's
    /// first chunk, so the stream it receives is not byte-identical.
    #[serde(default)]
    pub align_first_frame: bool,

    /// Encoder output read size
    #[serde(default = "default_chunk_size")]
    pub read_chunk_size: usize,

    /// Raw capture frame size
    #[serde(default = "default_chunk_size")]
    pub capture_frame_size: usize,

    /// Time the encoder gets to flush on shutdown
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Per-response pipe buffer
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,

    /// ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Capture sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Capture channel count
    #[serde(default = "default_channels")]
    pub channels: u8,

    /// Encoder output bitrate
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Command producing raw PCM on stdout (None = read stdin)
    pub capture_command: Option<String>,

    /// HTML file served at `/`
    pub landing_page: Option<String>,

    /// Log level for this crate when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            dotenvy::dotenv().ok();
        }

        let config = envy::prefixed(ENV_PREFIX)
            .from_env::<AppConfig>()
            .map_err(ConfigError::Env)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from explicit `(name, value)` pairs, names carrying the prefix
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, AppConfig>(vars)
            .map_err(ConfigError::Env)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values envy cannot check by type alone
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        self.overflow_policy()?;

        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(ConfigError::Invalid(
                "sample_rate and channels must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server_address().parse().map_err(|e| {
            ConfigError::Invalid(format!("bad bind address {}: {}", self.server_address(), e))
        })
    }

    pub fn overflow_policy(&self) -> Result<OverflowPolicy, ConfigError> {
        self.overflow_policy.parse().map_err(ConfigError::Invalid)
    }

    /// Hub settings; frame alignment only applies to MPEG audio output
    pub fn hub_config(&self, mpeg_output: bool) -> Result<HubConfig, ConfigError> {
        Ok(HubConfig::default()
            .queue_capacity(self.queue_capacity)
            .overflow_policy(self.overflow_policy()?)
            .max_sessions(self.max_sessions)
            .write_timeout(Duration::from_millis(self.write_timeout_ms))
            .align_first_frame(self.align_first_frame && mpeg_output))
    }

    pub fn server_config(&self, content_type: &'static str) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::with_addr(self.bind_addr()?)
            .pipe_capacity(self.pipe_capacity)
            .content_type(content_type);
        if let Some(ref page) = self.landing_page {
            config = config.landing_page(page);
        }
        Ok(config)
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig::default()
            .ffmpeg_path(PathBuf::from(&self.ffmpeg_path))
            .sample_rate(self.sample_rate)
            .channels(self.channels)
            .bitrate(self.bitrate.clone())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .read_chunk_size(self.read_chunk_size)
            .capture_frame_size(self.capture_frame_size)
            .flush_timeout(Duration::from_millis(self.flush_timeout_ms))
    }

    /// Default tracing filter directives
    pub fn log_filter(&self) -> String {
        format!("audiocast={},tower_http=info", self.log_level)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            queue_capacity: default_queue_capacity(),
            overflow_policy: default_overflow_policy(),
            max_sessions: 0,
            write_timeout_ms: default_write_timeout_ms(),
            align_first_frame: false,
            read_chunk_size: default_chunk_size(),
            capture_frame_size: default_chunk_size(),
            flush_timeout_ms: default_flush_timeout_ms(),
            pipe_capacity: default_pipe_capacity(),
            ffmpeg_path: default_ffmpeg_path(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bitrate: default_bitrate(),
            capture_command: None,
            landing_page: None,
            log_level: default_log_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Environment variable missing or unparsable
    Env(envy::Error),
    /// Value parsed but not usable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Env(e) => write!(f, "Environment variable error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Env(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_queue_capacity() -> usize {
    64
}

fn default_overflow_policy() -> String {
    OverflowPolicy::default().as_str().to_string()
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_chunk_size() -> usize {
    4096
}

fn default_flush_timeout_ms() -> u64 {
    2_000
}

fn default_pipe_capacity() -> usize {
    64 * 1024
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u8 {
    2
}

fn default_bitrate() -> String {
    "128k".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_env() {
        let config = AppConfig::from_vars(Vec::new()).unwrap();

        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.overflow_policy().unwrap(), OverflowPolicy::DropOldest);
        assert_eq!(config.write_timeout_ms, 10_000);
        assert!(config.capture_command.is_none());
        assert_eq!(config.log_filter(), "audiocast=info,tower_http=info");
        assert!(!config.align_first_frame);
        assert!(!config.hub_config(true).unwrap().align_first_frame);
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = AppConfig::from_vars(vars(&[
            ("AUDIOCAST_PORT", "9000"),
            ("AUDIOCAST_QUEUE_CAPACITY", "8"),
            ("AUDIOCAST_OVERFLOW_POLICY", "disconnect"),
            ("AUDIOCAST_MAX_SESSIONS", "100"),
            ("AUDIOCAST_ALIGN_FIRST_FRAME", "true"),
            ("AUDIOCAST_CAPTURE_COMMAND", "arecord -q -f S16_LE -t raw"),
            ("PORT", "1"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(
            config.capture_command.as_deref(),
            Some("arecord -q -f S16_LE -t raw")
        );

        let hub = config.hub_config(true).unwrap();
        assert_eq!(hub.queue_capacity, 8);
        assert_eq!(hub.overflow_policy, OverflowPolicy::Disconnect);
        assert_eq!(hub.max_sessions, 100);
        assert!(hub.align_first_frame);
    }

    #[test]
    fn test_alignment_needs_mpeg_output() {
        let config = AppConfig {
            align_first_frame: true,
            ..AppConfig::default()
        };

        assert!(config.hub_config(true).unwrap().align_first_frame);
        assert!(!config.hub_config(false).unwrap().align_first_frame);
    }

    #[test]
    fn test_unparsable_value() {
        let err = AppConfig::from_vars(vars(&[("AUDIOCAST_PORT", "eighty")])).unwrap_err();

        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_vars(vars(&[("AUDIOCAST_OVERFLOW_POLICY", "block")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_vars(vars(&[("AUDIOCAST_HOST", "not a host")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err =
            AppConfig::from_vars(vars(&[("AUDIOCAST_QUEUE_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_component_configs() {
        let config = AppConfig::from_vars(vars(&[
            ("AUDIOCAST_HOST", "127.0.0.1"),
            ("AUDIOCAST_SAMPLE_RATE", "48000"),
            ("AUDIOCAST_FLUSH_TIMEOUT_MS", "500"),
            ("AUDIOCAST_LANDING_PAGE", "/srv/index.html"),
        ]))
        .unwrap();

        let server = config.server_config("audio/mpeg").unwrap();
        let expected: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        assert_eq!(server.bind_addr, expected);
        assert_eq!(server.landing_page, Some(PathBuf::from("/srv/index.html")));

        assert_eq!(config.encoder_config().sample_rate, 48_000);
        assert_eq!(
            config.pipeline_config().flush_timeout,
            Duration::from_millis(500)
        );
    }
}
