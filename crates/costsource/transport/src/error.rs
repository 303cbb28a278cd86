//! Harness errors.
//!
//! Every variant is fatal to a conformance run: without a transport there is
//! nothing to test, so these never become test results.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The harness was built without a service implementation.
    #[error("Configuration error: no service implementation supplied")]
    MissingService,

    #[error("Harness already started")]
    AlreadyStarted,

    /// The in-memory listener went away before accepting.
    #[error("Listener closed")]
    ListenerClosed,

    #[error("Dial failed: {0}")]
    DialFailed(String),

    #[error("Handshake not completed within {0:?}")]
    Handshake(Duration),
}

/// Result type alias for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
