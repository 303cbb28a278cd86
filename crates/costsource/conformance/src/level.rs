//! Conformance levels and test categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Certification tier. Each level is a superset of the ones below it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConformanceLevel {
    #[default]
    Basic,
    Standard,
    Advanced,
}

impl ConformanceLevel {
    /// All levels, lowest first.
    pub fn all() -> &'static [ConformanceLevel] {
        &[Self::Basic, Self::Standard, Self::Advanced]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Advanced => "advanced",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Standard => "Standard",
            Self::Advanced => "Advanced",
        }
    }

    /// The next lower level, floored at `Basic`.
    pub fn below(&self) -> Self {
        match self {
            Self::Basic | Self::Standard => Self::Basic,
            Self::Advanced => Self::Standard,
        }
    }
}

impl fmt::Display for ConformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conformance level {0:?}")]
pub struct UnknownLevel(pub String);

impl FromStr for ConformanceLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// Level a run achieved: the target when nothing failed, one level lower
/// otherwise.
pub fn resolve_level_achieved(target: ConformanceLevel, failed: usize) -> ConformanceLevel {
    if failed == 0 {
        target
    } else {
        target.below()
    }
}

/// Grouping key for conformance tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    /// Response shapes and required fields.
    SpecValidation,
    /// Per-operation behavior, including error paths.
    RpcCorrectness,
    /// Latency against the baseline table.
    Performance,
    /// Parallel calls through one connection.
    Concurrency,
}

impl TestCategory {
    /// All categories in canonical order.
    pub fn all() -> &'static [TestCategory] {
        &[
            Self::SpecValidation,
            Self::RpcCorrectness,
            Self::Performance,
            Self::Concurrency,
        ]
    }

    /// Report key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpecValidation => "spec_validation",
            Self::RpcCorrectness => "rpc_correctness",
            Self::Performance => "performance",
            Self::Concurrency => "concurrency",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SpecValidation => "Spec Validation",
            Self::RpcCorrectness => "RPC Correctness",
            Self::Performance => "Performance",
            Self::Concurrency => "Concurrency",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown test category {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for TestCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
