//! Hub error types

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Shutdown sweep has started; no new sessions are accepted
    ShuttingDown,
    /// The configured session limit is reached
    SessionLimitReached(usize),
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::ShuttingDown => write!(f, "Hub is shutting down"),
            HubError::SessionLimitReached(max) => {
                write!(f, "Session limit reached ({} sessions)", max)
            }
        }
    }
}

impl std::error::Error for HubError {}
