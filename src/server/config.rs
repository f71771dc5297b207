//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

/// HTTP front door options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// HTML file served at `/` (None = built-in page)
    pub landing_page: Option<PathBuf>,

    /// Buffer between a session's drain task and its response body
    pub pipe_capacity: usize,

    /// Content-Type of `/stream` responses
    pub content_type: &'static str,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            landing_page: None,
            pipe_capacity: 64 * 1024, // 64KB
            content_type: "audio/mpeg",
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Serve this file at `/` instead of the built-in page
    pub fn landing_page(mut self, path: impl Into<PathBuf>) -> Self {
        self.landing_page = Some(path.into());
        self
    }

    /// Set the per-response pipe capacity
    pub fn pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(1);
        self
    }

    /// Set the stream content type
    pub fn content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.bind_addr.ip().is_unspecified());
        assert!(config.landing_page.is_none());
        assert_eq!(config.pipe_capacity, 64 * 1024);
        assert_eq!(config.content_type, "audio/mpeg");
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .landing_page("/srv/www/index.html")
            .pipe_capacity(0)
            .content_type("audio/ogg");

        assert_eq!(config.bind_addr, addr);
        assert_eq!(
            config.landing_page,
            Some(PathBuf::from("/srv/www/index.html"))
        );
        assert_eq!(config.pipe_capacity, 1);
        assert_eq!(config.content_type, "audio/ogg");
    }
}
