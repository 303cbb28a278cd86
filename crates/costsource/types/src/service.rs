//! The service trait a plugin implements.
//!
//! The five core operations are required. Extension operations default to
//! `Unimplemented` so an older plugin keeps compiling and a host can tell a
//! plugin that does not offer an operation apart from one that fails at it.

use crate::messages::*;
use crate::method::Method;
use crate::status::{CallResult, Status};
use async_trait::async_trait;

/// A cost-source plugin.
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Identity of the plugin.
    async fn name(&self) -> CallResult<String>;

    async fn supports(&self, request: SupportsRequest) -> CallResult<SupportsResponse>;

    async fn get_projected_cost(
        &self,
        request: ProjectedCostRequest,
    ) -> CallResult<ProjectedCostResponse>;

    async fn get_actual_cost(&self, request: ActualCostRequest) -> CallResult<ActualCostResponse>;

    async fn get_pricing_spec(&self, request: PricingSpecRequest) -> CallResult<PricingSpec>;

    async fn estimate_cost(
        &self,
        _request: EstimateCostRequest,
    ) -> CallResult<EstimateCostResponse> {
        Err(unimplemented(Method::EstimateCost))
    }

    async fn get_recommendations(
        &self,
        _request: RecommendationsRequest,
    ) -> CallResult<RecommendationsResponse> {
        Err(unimplemented(Method::GetRecommendations))
    }

    async fn get_budgets(&self, _request: BudgetsRequest) -> CallResult<BudgetsResponse> {
        Err(unimplemented(Method::GetBudgets))
    }

    async fn dry_run(&self, _request: DryRunRequest) -> CallResult<DryRunResponse> {
        Err(unimplemented(Method::DryRun))
    }
}

fn unimplemented(method: Method) -> Status {
    Status::unimplemented(format!("method {} not implemented", method))
}

/// Adapter answering its name and nothing else.
///
/// Useful as a base for partial plugins and as a fixture for the
/// "legacy plugin" path.
#[derive(Debug, Clone)]
pub struct UnimplementedCostSource {
    name: String,
}

impl UnimplementedCostSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl CostSource for UnimplementedCostSource {
    async fn name(&self) -> CallResult<String> {
        Ok(self.name.clone())
    }

    async fn supports(&self, _request: SupportsRequest) -> CallResult<SupportsResponse> {
        Err(unimplemented(Method::Supports))
    }

    async fn get_projected_cost(
        &self,
        _request: ProjectedCostRequest,
    ) -> CallResult<ProjectedCostResponse> {
        Err(unimplemented(Method::GetProjectedCost))
    }

    async fn get_actual_cost(
        &self,
        _request: ActualCostRequest,
    ) -> CallResult<ActualCostResponse> {
        Err(unimplemented(Method::GetActualCost))
    }

    async fn get_pricing_spec(&self, _request: PricingSpecRequest) -> CallResult<PricingSpec> {
        Err(unimplemented(Method::GetPricingSpec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn adapter_answers_name_only() {
        let plugin = UnimplementedCostSource::new("legacy");
        assert_eq!(plugin.name().await.unwrap(), "legacy");

        let err = plugin
            .supports(SupportsRequest::default())
            .await
            .expect_err("supports is not offered");
        assert!(err.is_unimplemented());
    }

    #[tokio::test]
    async fn extension_defaults_are_unimplemented() {
        let plugin = UnimplementedCostSource::new("legacy");
        let err = plugin
            .get_budgets(BudgetsRequest::default())
            .await
            .expect_err("budgets default");
        assert!(err.is_unimplemented());
        assert!(err.message.contains("GetBudgets"));

        let err = plugin.dry_run(DryRunRequest::default()).await.unwrap_err();
        assert!(err.is_unimplemented());
    }
}
