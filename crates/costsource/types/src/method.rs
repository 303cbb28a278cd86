//! Operation identifiers for the cost-source contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One operation of the cost-source service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    Name,
    Supports,
    GetProjectedCost,
    GetActualCost,
    GetPricingSpec,
    EstimateCost,
    GetRecommendations,
    GetBudgets,
    DryRun,
}

impl Method {
    /// Every operation, core first.
    pub const ALL: [Method; 9] = [
        Method::Name,
        Method::Supports,
        Method::GetProjectedCost,
        Method::GetActualCost,
        Method::GetPricingSpec,
        Method::EstimateCost,
        Method::GetRecommendations,
        Method::GetBudgets,
        Method::DryRun,
    ];

    /// Wire-style name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Supports => "Supports",
            Self::GetProjectedCost => "GetProjectedCost",
            Self::GetActualCost => "GetActualCost",
            Self::GetPricingSpec => "GetPricingSpec",
            Self::EstimateCost => "EstimateCost",
            Self::GetRecommendations => "GetRecommendations",
            Self::GetBudgets => "GetBudgets",
            Self::DryRun => "DryRun",
        }
    }

    /// Core operations every plugin must serve. The rest may answer
    /// `Unimplemented`.
    pub fn is_core(&self) -> bool {
        matches!(
            self,
            Self::Name
                | Self::Supports
                | Self::GetProjectedCost
                | Self::GetActualCost
                | Self::GetPricingSpec
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}
