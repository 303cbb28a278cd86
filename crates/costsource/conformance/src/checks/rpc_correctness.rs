//! Per-operation behavior, including the error paths.

use super::{expect_rejection, from_validation, INVALID_PROVIDER};
use crate::error::RegistryError;
use crate::level::{ConformanceLevel, TestCategory};
use crate::registry::{RegisteredTest, TestContext, TestRegistry};
use crate::result::TestResult;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use costsource_types::*;
use std::time::Instant;

/// Upper bound on pages walked before the token chain is declared broken.
const MAX_PAGES: usize = 10_000;

const PAGE_SIZE: u32 = 50;

const REPEATS: usize = 3;

pub fn register(registry: &mut TestRegistry) -> Result<(), RegistryError> {
    use ConformanceLevel::*;
    let category = TestCategory::RpcCorrectness;

    let tests = [
        RegisteredTest::new(
            "name_consistent",
            "Repeated identity calls return the same name",
            category,
            Basic,
            name_consistent,
        ),
        RegisteredTest::new(
            "supports_valid_resource",
            "The probe resource is reported as supported",
            category,
            Basic,
            supports_valid_resource,
        ),
        RegisteredTest::new(
            "supports_invalid_provider",
            "An unknown provider is reported unsupported with a reason",
            category,
            Basic,
            supports_invalid_provider,
        ),
        RegisteredTest::new(
            "projected_cost_valid",
            "Projected cost for the probe resource is well formed",
            category,
            Basic,
            projected_cost_valid,
        ),
        RegisteredTest::new(
            "actual_cost_valid_range",
            "Actual cost over one day returns in-range, non-negative records",
            category,
            Basic,
            actual_cost_valid_range,
        ),
        RegisteredTest::new(
            "supports_missing_resource",
            "A capability query without a resource is refused cleanly",
            category,
            Standard,
            supports_missing_resource,
        ),
        RegisteredTest::new(
            "projected_cost_invalid_resource",
            "Projected cost for an unknown provider is rejected",
            category,
            Standard,
            projected_cost_invalid_resource,
        ),
        RegisteredTest::new(
            "actual_cost_invalid_range",
            "An inverted time range is rejected as an invalid argument",
            category,
            Standard,
            actual_cost_invalid_range,
        ),
        RegisteredTest::new(
            "actual_cost_pagination",
            "Following page tokens returns every record exactly once",
            category,
            Standard,
            actual_cost_pagination,
        ),
        RegisteredTest::new(
            "pricing_spec_deterministic",
            "Repeated pricing spec calls return identical specs",
            category,
            Standard,
            pricing_spec_deterministic,
        ),
        RegisteredTest::new(
            "optional_methods",
            "Extension methods either answer or report Unimplemented",
            category,
            Advanced,
            optional_methods,
        ),
    ];
    for test in tests {
        registry.register(test)?;
    }
    Ok(())
}

fn fixed_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn invalid_resource(ctx: &TestContext) -> ResourceDescriptor {
    let mut resource = ctx.probe();
    resource.provider = INVALID_PROVIDER.to_string();
    resource
}

fn call_failed(method: Method, status: &Status, started: Instant) -> TestResult {
    TestResult::from_status(method.as_str(), status, started.elapsed())
}

async fn name_consistent(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let mut names = Vec::with_capacity(REPEATS);
    for _ in 0..REPEATS {
        match ctx.client.name().await {
            Ok(name) => names.push(name),
            Err(status) => return call_failed(Method::Name, &status, started),
        }
    }
    if names.windows(2).all(|w| w[0] == w[1]) {
        TestResult::pass(Method::Name.as_str(), started.elapsed())
    } else {
        TestResult::fail(
            Method::Name.as_str(),
            format!("name changed between calls: {:?}", names),
            started.elapsed(),
        )
    }
}

async fn supports_valid_resource(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let resource = ctx.probe();
    let request = SupportsRequest {
        resource: Some(resource.clone()),
    };
    match ctx.client.supports(request).await {
        Ok(response) if response.supported => {
            TestResult::pass(Method::Supports.as_str(), started.elapsed())
        }
        Ok(response) => TestResult::fail(
            Method::Supports.as_str(),
            format!("{} reported unsupported: {}", resource, response.reason),
            started.elapsed(),
        ),
        Err(status) => call_failed(Method::Supports, &status, started),
    }
}

async fn supports_invalid_provider(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let resource = invalid_resource(&ctx);
    let request = SupportsRequest {
        resource: Some(resource.clone()),
    };
    match ctx.client.supports(request).await {
        Ok(response) if response.supported => TestResult::fail(
            Method::Supports.as_str(),
            format!("{} reported as supported", resource),
            started.elapsed(),
        ),
        Ok(response) => from_validation(
            Method::Supports,
            &ctx.validator().validate_supports(&response),
            started,
        ),
        Err(status) => call_failed(Method::Supports, &status, started),
    }
}

async fn projected_cost_valid(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let request = ProjectedCostRequest {
        resource: Some(ctx.probe()),
    };
    match ctx.client.get_projected_cost(request).await {
        Ok(response) => {
            let validation = ctx.validator().validate_projected_cost(&response);
            from_validation(Method::GetProjectedCost, &validation, started)
        }
        Err(status) => call_failed(Method::GetProjectedCost, &status, started),
    }
}

async fn actual_cost_valid_range(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let start = fixed_start();
    let end = start + ChronoDuration::hours(24);
    let request = ActualCostRequest::new(ctx.config.probe.resource_id.clone(), start, end);
    match ctx.client.get_actual_cost(request).await {
        Ok(response) => {
            let validation = ctx.validator().validate_actual_cost(&response, start, end);
            from_validation(Method::GetActualCost, &validation, started)
                .with_details(format!("{} records", response.results.len()))
        }
        Err(status) => call_failed(Method::GetActualCost, &status, started),
    }
}

async fn supports_missing_resource(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    match ctx.client.supports(SupportsRequest { resource: None }).await {
        Ok(response) if response.supported => TestResult::fail(
            Method::Supports.as_str(),
            "missing resource reported as supported",
            started.elapsed(),
        ),
        Ok(response) => from_validation(
            Method::Supports,
            &ctx.validator().validate_supports(&response),
            started,
        ),
        Err(status) => expect_rejection::<()>(
            Method::Supports,
            Err(status),
            &[Code::InvalidArgument],
            started,
        ),
    }
}

async fn projected_cost_invalid_resource(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let request = ProjectedCostRequest {
        resource: Some(invalid_resource(&ctx)),
    };
    let outcome = ctx.client.get_projected_cost(request).await;
    expect_rejection(
        Method::GetProjectedCost,
        outcome,
        &[Code::InvalidArgument, Code::NotFound],
        started,
    )
}

async fn actual_cost_invalid_range(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let start = fixed_start();
    let request = ActualCostRequest::new(
        ctx.config.probe.resource_id.clone(),
        start,
        start - ChronoDuration::hours(1),
    );
    let outcome = ctx.client.get_actual_cost(request).await;
    expect_rejection(
        Method::GetActualCost,
        outcome,
        &[Code::InvalidArgument],
        started,
    )
}

async fn actual_cost_pagination(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let method = Method::GetActualCost;
    let start = fixed_start();
    let end = start + ChronoDuration::days(7);
    let resource_id = ctx.config.probe.resource_id.clone();

    let mut token = String::new();
    let mut seen = Vec::new();
    let mut pages = 0;
    let mut reported_total = 0;
    loop {
        let request =
            ActualCostRequest::new(resource_id.clone(), start, end).with_page(PAGE_SIZE, &token);
        let response = match ctx.client.get_actual_cost(request).await {
            Ok(response) => response,
            Err(status) => return call_failed(method, &status, started),
        };
        pages += 1;

        if response.results.len() > PAGE_SIZE as usize {
            return TestResult::fail(
                method.as_str(),
                format!(
                    "page {} holds {} records, page size is {}",
                    pages,
                    response.results.len(),
                    PAGE_SIZE
                ),
                started.elapsed(),
            );
        }
        let validation = ctx.validator().validate_actual_cost(&response, start, end);
        if !validation.is_valid() {
            return from_validation(method, &validation, started);
        }

        reported_total = response.total_count;
        seen.extend(response.results);

        if response.next_page_token.is_empty() {
            break;
        }
        if response.next_page_token == token {
            return TestResult::fail(
                method.as_str(),
                format!("page token {:?} repeats itself", token),
                started.elapsed(),
            );
        }
        if pages >= MAX_PAGES {
            return TestResult::fail(
                method.as_str(),
                format!("no final page after {} pages", pages),
                started.elapsed(),
            );
        }
        token = response.next_page_token;
    }

    if reported_total > 0 && seen.len() as u64 != reported_total {
        return TestResult::fail(
            method.as_str(),
            format!(
                "pages returned {} records, total_count is {}",
                seen.len(),
                reported_total
            ),
            started.elapsed(),
        );
    }

    let whole = ActualCostRequest::new(resource_id, start, end);
    match ctx.client.get_actual_cost(whole).await {
        Ok(response) if response.results == seen => {
            TestResult::pass(method.as_str(), started.elapsed())
                .with_details(format!("{} records in {} pages", seen.len(), pages))
        }
        Ok(response) => TestResult::fail(
            method.as_str(),
            format!(
                "paged walk returned {} records, unpaged query {}",
                seen.len(),
                response.results.len()
            ),
            started.elapsed(),
        ),
        Err(status) => call_failed(method, &status, started),
    }
}

async fn pricing_spec_deterministic(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let resource = ctx.probe();
    let mut specs = Vec::with_capacity(REPEATS);
    for _ in 0..REPEATS {
        let request = PricingSpecRequest {
            resource: Some(resource.clone()),
        };
        match ctx.client.get_pricing_spec(request).await {
            Ok(spec) => specs.push(spec),
            Err(status) => return call_failed(Method::GetPricingSpec, &status, started),
        }
    }
    if specs.windows(2).all(|w| w[0] == w[1]) {
        TestResult::pass(Method::GetPricingSpec.as_str(), started.elapsed())
    } else {
        TestResult::fail(
            Method::GetPricingSpec.as_str(),
            format!("pricing spec for {} changed between calls", resource),
            started.elapsed(),
        )
    }
}

async fn optional_methods(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let resource = ctx.probe();
    let mut attributes = std::collections::BTreeMap::new();
    attributes.insert("sku".to_string(), resource.sku.clone());
    attributes.insert("region".to_string(), resource.region.clone());

    let outcomes: Vec<(Method, Result<(), Status>)> = vec![
        (
            Method::EstimateCost,
            ctx.client
                .estimate_cost(EstimateCostRequest {
                    resource_type: format!("{}/{}", resource.provider, resource.resource_type),
                    attributes,
                })
                .await
                .map(|_| ()),
        ),
        (
            Method::GetRecommendations,
            ctx.client
                .get_recommendations(RecommendationsRequest {
                    resources: vec![resource.clone()],
                })
                .await
                .map(|_| ()),
        ),
        (
            Method::GetBudgets,
            ctx.client
                .get_budgets(BudgetsRequest {
                    provider: Some(resource.provider.clone()),
                })
                .await
                .map(|_| ()),
        ),
        (
            Method::DryRun,
            ctx.client
                .dry_run(DryRunRequest {
                    resource: Some(resource.clone()),
                })
                .await
                .map(|_| ()),
        ),
    ];

    let mut implemented = Vec::new();
    let mut problems = Vec::new();
    for (method, outcome) in outcomes {
        match outcome {
            Ok(()) => implemented.push(method.as_str()),
            Err(status) if status.is_unimplemented() => {}
            Err(status) => problems.push(format!("{}: {}", method, status)),
        }
    }

    if problems.is_empty() {
        let details = if implemented.is_empty() {
            "no extension methods implemented".to_string()
        } else {
            format!("implemented: {}", implemented.join(", "))
        };
        TestResult::pass("extensions", started.elapsed()).with_details(details)
    } else {
        TestResult::fail("extensions", problems.join("; "), started.elapsed())
    }
}
