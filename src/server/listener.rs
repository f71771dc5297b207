//! HTTP server listener
//!
//! Binds the TCP listener and runs the axum router until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::hub::BroadcastHub;
use crate::server::config::ServerConfig;
use crate::server::routes;

/// Audio streaming server
#[derive(Debug)]
pub struct StreamServer {
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
}

impl StreamServer {
    /// Create a server handing listeners to `hub`
    pub fn new(config: ServerConfig, hub: Arc<BroadcastHub>) -> Self {
        Self { config, hub }
    }

    /// Get a reference to the broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// The axum router serving this server's endpoints
    pub fn router(&self) -> axum::Router {
        routes::router(&self.config, Arc::clone(&self.hub))
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// After the signal no new connections are accepted; open streams finish
    /// when the hub closes their sessions.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Audio server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Server(e.to_string()))?;

        tracing::info!("Audio server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let hub = Arc::new(BroadcastHub::new());
        let server = StreamServer::new(ServerConfig::default(), hub);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server.serve(listener, async {}),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_until_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let server = StreamServer::new(
            ServerConfig::with_addr(addr),
            Arc::new(BroadcastHub::new()),
        );

        let err = server.run_until(async {}).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
