//! Session handle and drain loop
//!
//! A [`SessionHandle`] is what [`BroadcastHub::register`] hands to the HTTP
//! layer. It is the registration: dropping it unregisters the session.
//! [`SessionHandle::drain`] is the per-client write loop; it owns the network
//! writer for as long as the session is open.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::hub::{BroadcastHub, Chunk, SessionId};

use super::client::ClientSession;

/// How long the drain loop waits for the writer to shut down after closing
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Why a session's network write failed
#[derive(Debug)]
pub enum WriteFailure {
    /// The writer returned an error (client gone, socket reset)
    Io(std::io::Error),
    /// A single write took longer than the session's write timeout
    TimedOut(Duration),
}

impl std::fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteFailure::Io(e) => write!(f, "write failed: {}", e),
            WriteFailure::TimedOut(t) => write!(f, "write timed out after {:?}", t),
        }
    }
}

impl std::error::Error for WriteFailure {}

/// How a drain loop ended
#[derive(Debug)]
pub enum DrainOutcome {
    /// Session was closed (by the client going away, the hub, or the overflow policy)
    Closed,
    /// Writing to the client failed
    WriteFailed(WriteFailure),
}

impl DrainOutcome {
    pub fn is_write_failure(&self) -> bool {
        matches!(self, DrainOutcome::WriteFailed(_))
    }
}

/// Registration of one client with the hub
#[derive(Debug)]
pub struct SessionHandle {
    session: Arc<ClientSession>,
    hub: Arc<BroadcastHub>,
}

impl SessionHandle {
    pub(crate) fn new(session: Arc<ClientSession>, hub: Arc<BroadcastHub>) -> Self {
        Self { session, hub }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    /// The underlying session
    pub fn session(&self) -> &Arc<ClientSession> {
        &self.session
    }

    /// Wait for the next outgoing chunk; None once the session is closed
    pub async fn recv(&self) -> Option<Chunk> {
        self.session.next_chunk().await
    }

    /// Signal disconnection: close the session and unregister it
    pub fn close(&self) {
        self.hub.unregister(self.id());
    }

    /// A guard that closes the session when dropped
    ///
    /// Lets a response body tie the session's lifetime to the connection
    /// without owning the handle itself.
    pub fn close_guard(&self) -> CloseGuard {
        CloseGuard {
            session: Arc::clone(&self.session),
        }
    }

    /// Drain queued chunks into `writer` until the session closes or a write fails
    ///
    /// Each write (including flush) is bounded by the session's write timeout.
    /// On exit the session is Closed and removed from the hub, and the writer
    /// has been shut down and dropped.
    pub async fn drain<W>(self, mut writer: W) -> DrainOutcome
    where
        W: AsyncWrite + Unpin,
    {
        let session = Arc::clone(&self.session);
        let write_timeout = session.write_timeout();

        tracing::debug!(session_id = %session.id(), "Drain loop started");

        let outcome = loop {
            let chunk = match session.next_chunk().await {
                Some(chunk) => chunk,
                None => break DrainOutcome::Closed,
            };

            let write = async {
                writer.write_all(chunk.as_ref()).await?;
                writer.flush().await
            };

            tokio::select! {
                biased;
                _ = session.closed() => break DrainOutcome::Closed,
                result = tokio::time::timeout(write_timeout, write) => match result {
                    Ok(Ok(())) => session.record_sent(chunk.len()),
                    Ok(Err(e)) => break DrainOutcome::WriteFailed(WriteFailure::Io(e)),
                    Err(_) => {
                        break DrainOutcome::WriteFailed(WriteFailure::TimedOut(write_timeout))
                    }
                },
            }
        };

        session.close();
        if let DrainOutcome::WriteFailed(ref failure) = outcome {
            tracing::debug!(
                session_id = %session.id(),
                error = %failure,
                "Session write failure"
            );
        } else {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, writer.shutdown()).await;
        }
        drop(writer);

        session.mark_closed();
        let stats = session.stats();
        tracing::info!(
            session_id = %session.id(),
            chunks_sent = stats.chunks_sent,
            bytes_sent = stats.bytes_sent,
            chunks_dropped = stats.chunks_dropped,
            bitrate = stats.bitrate(),
            "Session closed"
        );

        // Dropping `self` unregisters
        outcome
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.hub.unregister(self.id());
    }
}

/// Closes a session when dropped
#[derive(Debug)]
pub struct CloseGuard {
    session: Arc<ClientSession>,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}
