//! Frames carried over an in-memory connection.

use costsource_types::*;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A call, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Name,
    Supports(SupportsRequest),
    ProjectedCost(ProjectedCostRequest),
    ActualCost(ActualCostRequest),
    PricingSpec(PricingSpecRequest),
    EstimateCost(EstimateCostRequest),
    Recommendations(RecommendationsRequest),
    Budgets(BudgetsRequest),
    DryRun(DryRunRequest),
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Self::Name => Method::Name,
            Self::Supports(_) => Method::Supports,
            Self::ProjectedCost(_) => Method::GetProjectedCost,
            Self::ActualCost(_) => Method::GetActualCost,
            Self::PricingSpec(_) => Method::GetPricingSpec,
            Self::EstimateCost(_) => Method::EstimateCost,
            Self::Recommendations(_) => Method::GetRecommendations,
            Self::Budgets(_) => Method::GetBudgets,
            Self::DryRun(_) => Method::DryRun,
        }
    }
}

/// The successful answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Name(String),
    Supports(SupportsResponse),
    ProjectedCost(ProjectedCostResponse),
    ActualCost(ActualCostResponse),
    PricingSpec(PricingSpec),
    EstimateCost(EstimateCostResponse),
    Recommendations(RecommendationsResponse),
    Budgets(BudgetsResponse),
    DryRun(DryRunResponse),
}

impl Response {
    pub fn method(&self) -> Method {
        match self {
            Self::Name(_) => Method::Name,
            Self::Supports(_) => Method::Supports,
            Self::ProjectedCost(_) => Method::GetProjectedCost,
            Self::ActualCost(_) => Method::GetActualCost,
            Self::PricingSpec(_) => Method::GetPricingSpec,
            Self::EstimateCost(_) => Method::EstimateCost,
            Self::Recommendations(_) => Method::GetRecommendations,
            Self::Budgets(_) => Method::GetBudgets,
            Self::DryRun(_) => Method::DryRun,
        }
    }
}

/// Request plus the deadline and the slot its answer goes into.
pub(crate) struct Envelope {
    pub request: Request,
    pub deadline: Instant,
    pub reply: oneshot::Sender<CallResult<Response>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_response_methods_agree() {
        assert_eq!(Request::Name.method(), Response::Name("x".into()).method());
        assert_eq!(
            Request::Budgets(BudgetsRequest::default()).method(),
            Method::GetBudgets
        );
        assert_eq!(
            Response::DryRun(DryRunResponse::default()).method(),
            Method::DryRun
        );
    }
}
