//! Latency tests against the baseline table.

use crate::error::RegistryError;
use crate::level::{ConformanceLevel, TestCategory};
use crate::performance::{
    baseline_for, compare_to_baseline, iterations_for, measure, measure_for, within_tolerance,
    PerformanceResult, VARIANCE_TOLERANCE_PERCENT,
};
use crate::registry::{RegisteredTest, TestContext, TestRegistry};
use crate::result::TestResult;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use costsource_types::*;
use std::time::Instant;

pub fn register(registry: &mut TestRegistry) -> Result<(), RegistryError> {
    use ConformanceLevel::*;
    let category = TestCategory::Performance;

    let tests = [
        RegisteredTest::new(
            "name_latency",
            "Identity call stays under its latency baseline",
            category,
            Standard,
            name_latency,
        ),
        RegisteredTest::new(
            "supports_latency",
            "Capability query stays under its latency baseline",
            category,
            Standard,
            supports_latency,
        ),
        RegisteredTest::new(
            "projected_cost_latency",
            "Projected cost stays under its latency baseline",
            category,
            Standard,
            projected_cost_latency,
        ),
        RegisteredTest::new(
            "pricing_spec_latency",
            "Pricing spec stays under its latency baseline",
            category,
            Standard,
            pricing_spec_latency,
        ),
        RegisteredTest::new(
            "actual_cost_latency",
            "One-day actual cost query stays under its latency baseline",
            category,
            Standard,
            actual_cost_latency,
        ),
        RegisteredTest::new(
            "sustained_throughput",
            "Back-to-back identity calls for the benchmark window never fail",
            category,
            Advanced,
            sustained_throughput,
        ),
    ];
    for test in tests {
        registry.register(test)?;
    }
    Ok(())
}

/// Turn a measurement into a verdict for the run's target level.
fn judge(ctx: &TestContext, method: Method, mut measured: PerformanceResult) -> TestResult {
    let Some(baseline) = baseline_for(method) else {
        return TestResult::fail(
            method.as_str(),
            format!("no latency baseline for {}", method),
            measured.avg,
        );
    };
    compare_to_baseline(&mut measured, baseline);
    let total = measured.avg * u32::try_from(measured.iterations).unwrap_or(u32::MAX);
    let details = measured.summary();

    if measured.errors > 0 {
        return TestResult::fail(
            method.as_str(),
            format!(
                "{} of {} calls failed, last: {}",
                measured.errors,
                measured.iterations,
                measured.last_error.as_deref().unwrap_or_default()
            ),
            total,
        )
        .with_details(details);
    }
    if !measured.standard_passed {
        return TestResult::fail(
            method.as_str(),
            format!(
                "average {} exceeds standard baseline {}",
                crate::durations::format_duration(measured.avg),
                crate::durations::format_duration(baseline.standard_latency)
            ),
            total,
        )
        .with_details(details);
    }
    if ctx.target_level() >= ConformanceLevel::Advanced {
        if !measured.advanced_passed {
            return TestResult::fail(
                method.as_str(),
                format!(
                    "average {} exceeds advanced baseline {}",
                    crate::durations::format_duration(measured.avg),
                    crate::durations::format_duration(baseline.advanced_latency)
                ),
                total,
            )
            .with_details(details);
        }
        if !within_tolerance(&measured, VARIANCE_TOLERANCE_PERCENT) {
            return TestResult::fail(
                method.as_str(),
                format!(
                    "variance {:+.1}% exceeds {}% tolerance",
                    measured.variance_percent, VARIANCE_TOLERANCE_PERCENT
                ),
                total,
            )
            .with_details(details);
        }
    }
    TestResult::pass(method.as_str(), total).with_details(details)
}

async fn name_latency(ctx: TestContext) -> TestResult {
    let method = Method::Name;
    let client = ctx.client.clone();
    let measured = measure(method.as_str(), iterations_for(method), || {
        let client = client.clone();
        async move { client.name().await }
    })
    .await;
    judge(&ctx, method, measured)
}

async fn supports_latency(ctx: TestContext) -> TestResult {
    let method = Method::Supports;
    let client = ctx.client.clone();
    let request = SupportsRequest {
        resource: Some(ctx.probe()),
    };
    let measured = measure(method.as_str(), iterations_for(method), || {
        let client = client.clone();
        let request = request.clone();
        async move { client.supports(request).await }
    })
    .await;
    judge(&ctx, method, measured)
}

async fn projected_cost_latency(ctx: TestContext) -> TestResult {
    let method = Method::GetProjectedCost;
    let client = ctx.client.clone();
    let request = ProjectedCostRequest {
        resource: Some(ctx.probe()),
    };
    let measured = measure(method.as_str(), iterations_for(method), || {
        let client = client.clone();
        let request = request.clone();
        async move { client.get_projected_cost(request).await }
    })
    .await;
    judge(&ctx, method, measured)
}

async fn pricing_spec_latency(ctx: TestContext) -> TestResult {
    let method = Method::GetPricingSpec;
    let client = ctx.client.clone();
    let request = PricingSpecRequest {
        resource: Some(ctx.probe()),
    };
    let measured = measure(method.as_str(), iterations_for(method), || {
        let client = client.clone();
        let request = request.clone();
        async move { client.get_pricing_spec(request).await }
    })
    .await;
    judge(&ctx, method, measured)
}

async fn actual_cost_latency(ctx: TestContext) -> TestResult {
    let method = Method::GetActualCost;
    let Some(start) = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single() else {
        return TestResult::fail(method.as_str(), "invalid query start", Default::default());
    };
    let client = ctx.client.clone();
    let request = ActualCostRequest::new(
        ctx.config.probe.resource_id.clone(),
        start,
        start + ChronoDuration::hours(24),
    );
    let measured = measure(method.as_str(), iterations_for(method), || {
        let client = client.clone();
        let request = request.clone();
        async move { client.get_actual_cost(request).await }
    })
    .await;
    judge(&ctx, method, measured)
}

async fn sustained_throughput(ctx: TestContext) -> TestResult {
    let method = Method::Name;
    if !ctx.config.enable_benchmarks {
        return TestResult::pass(method.as_str(), Default::default())
            .with_details("benchmarks disabled");
    }

    let window = ctx.config.benchmark_duration();
    let started = Instant::now();
    let client = ctx.client.clone();
    let measured = measure_for(method.as_str(), window, || {
        let client = client.clone();
        async move { client.name().await }
    })
    .await;
    let elapsed = started.elapsed();
    let rate = measured.iterations as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    let details = format!("{}, {:.0} calls/s", measured.summary(), rate);

    if measured.errors > 0 {
        TestResult::fail(
            method.as_str(),
            format!(
                "{} of {} calls failed, last: {}",
                measured.errors,
                measured.iterations,
                measured.last_error.as_deref().unwrap_or_default()
            ),
            elapsed,
        )
        .with_details(details)
    } else {
        TestResult::pass(method.as_str(), elapsed).with_details(details)
    }
}
