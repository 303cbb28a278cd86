//! Error types for the conformance suite.
//!
//! Only [`SuiteError`] aborts a run. Everything that goes wrong inside a test
//! ends up as a failed [`TestResult`](crate::TestResult) instead.

use costsource_transport::HarnessError;
use costsource_types::Method;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("test {0:?} is already registered")]
    DuplicateTest(String),
}

#[derive(Debug, Error)]
pub enum SuiteError {
    /// Transport setup failed; no test could run.
    #[error("Transport setup failed: {0}")]
    Transport(#[from] HarnessError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for SuiteError {
    fn from(err: config::ConfigError) -> Self {
        SuiteError::Config(err.to_string())
    }
}

/// Result type alias for suite operations
pub type SuiteResult<T> = Result<T, SuiteError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConcurrencyError {
    #[error("{failed} of {width} parallel calls failed")]
    Failures { failed: usize, width: usize },

    #[error("{distinct} distinct responses across {width} identical calls")]
    Inconsistent { distinct: usize, width: usize },

    #[error("no invoker registered for {0}")]
    UnsupportedMethod(Method),

    #[error("fan-out width must be at least 1, got {0}")]
    InvalidWidth(usize),
}
