//! Response shape and required-field checks.

use super::from_validation;
use crate::error::RegistryError;
use crate::level::{ConformanceLevel, TestCategory};
use crate::registry::{RegisteredTest, TestContext, TestRegistry};
use crate::result::TestResult;
use costsource_types::{Method, PricingSpecRequest, ProjectedCostRequest};
use std::time::Instant;

pub fn register(registry: &mut TestRegistry) -> Result<(), RegistryError> {
    use ConformanceLevel::*;
    let category = TestCategory::SpecValidation;

    registry.register(RegisteredTest::new(
        "name_present",
        "Plugin reports a non-empty name within the length limit",
        category,
        Basic,
        name_present,
    ))?;
    registry.register(RegisteredTest::new(
        "pricing_spec_schema",
        "Pricing spec for the probe resource has valid required fields",
        category,
        Basic,
        pricing_spec_schema,
    ))?;
    registry.register(RegisteredTest::new(
        "pricing_spec_complete",
        "Pricing spec also fills description, assumptions and a matching unit",
        category,
        Standard,
        pricing_spec_complete,
    ))?;
    registry.register(RegisteredTest::new(
        "projected_cost_schema",
        "Projected cost carries valid prices, currency and billing detail",
        category,
        Standard,
        projected_cost_schema,
    ))?;
    registry.register(RegisteredTest::new(
        "billing_mode_consistent",
        "Projected cost and pricing spec agree on billing mode and currency",
        category,
        Standard,
        billing_mode_consistent,
    ))?;
    Ok(())
}

async fn name_present(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    match ctx.client.name().await {
        Ok(name) => from_validation(Method::Name, &ctx.validator().validate_name(&name), started),
        Err(status) => TestResult::from_status(Method::Name.as_str(), &status, started.elapsed()),
    }
}

async fn pricing_spec_schema(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let request = PricingSpecRequest {
        resource: Some(ctx.probe()),
    };
    match ctx.client.get_pricing_spec(request).await {
        Ok(spec) => from_validation(
            Method::GetPricingSpec,
            &ctx.validator().validate_pricing_spec(&spec),
            started,
        ),
        Err(status) => {
            TestResult::from_status(Method::GetPricingSpec.as_str(), &status, started.elapsed())
        }
    }
}

async fn pricing_spec_complete(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let request = PricingSpecRequest {
        resource: Some(ctx.probe()),
    };
    match ctx.client.get_pricing_spec(request).await {
        Ok(spec) => from_validation(
            Method::GetPricingSpec,
            &ctx.validator().validate_pricing_spec(&spec).strict(),
            started,
        ),
        Err(status) => {
            TestResult::from_status(Method::GetPricingSpec.as_str(), &status, started.elapsed())
        }
    }
}

async fn projected_cost_schema(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let request = ProjectedCostRequest {
        resource: Some(ctx.probe()),
    };
    match ctx.client.get_projected_cost(request).await {
        Ok(response) => from_validation(
            Method::GetProjectedCost,
            &ctx.validator().validate_projected_cost(&response).strict(),
            started,
        ),
        Err(status) => {
            TestResult::from_status(Method::GetProjectedCost.as_str(), &status, started.elapsed())
        }
    }
}

async fn billing_mode_consistent(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let resource = ctx.probe();

    let projected = match ctx
        .client
        .get_projected_cost(ProjectedCostRequest {
            resource: Some(resource.clone()),
        })
        .await
    {
        Ok(response) => response,
        Err(status) => {
            return TestResult::from_status(
                Method::GetProjectedCost.as_str(),
                &status,
                started.elapsed(),
            )
        }
    };
    let spec = match ctx
        .client
        .get_pricing_spec(PricingSpecRequest {
            resource: Some(resource),
        })
        .await
    {
        Ok(spec) => spec,
        Err(status) => {
            return TestResult::from_status(
                Method::GetPricingSpec.as_str(),
                &status,
                started.elapsed(),
            )
        }
    };

    let mut problems = Vec::new();
    if projected.billing_mode != spec.billing_mode {
        problems.push(format!(
            "billing mode {} in projected cost, {} in pricing spec",
            projected.billing_mode, spec.billing_mode
        ));
    }
    if projected.currency != spec.currency {
        problems.push(format!(
            "currency {} in projected cost, {} in pricing spec",
            projected.currency, spec.currency
        ));
    }
    if problems.is_empty() {
        TestResult::pass(Method::GetPricingSpec.as_str(), started.elapsed())
    } else {
        TestResult::fail(
            Method::GetPricingSpec.as_str(),
            problems.join("; "),
            started.elapsed(),
        )
    }
}
