//! Parallel calls through the shared connection.

use crate::concurrency::ConcurrencyValidator;
use crate::error::RegistryError;
use crate::level::{ConformanceLevel, TestCategory};
use crate::registry::{RegisteredTest, TestContext, TestRegistry};
use crate::result::TestResult;
use costsource_transport::PluginClient;
use costsource_types::{Code, Method};
use std::time::Instant;

/// Width multiplier for the high fan-out test.
const HIGH_FANOUT_FACTOR: usize = 4;

pub fn register(registry: &mut TestRegistry) -> Result<(), RegistryError> {
    use ConformanceLevel::*;
    let category = TestCategory::Concurrency;

    let tests = [
        RegisteredTest::new(
            "parallel_name",
            "Parallel identity calls all succeed",
            category,
            Standard,
            parallel_name,
        ),
        RegisteredTest::new(
            "consistent_responses",
            "Parallel identity calls all return the same answer",
            category,
            Standard,
            consistent_responses,
        ),
        RegisteredTest::new(
            "parallel_mixed",
            "Every probed operation survives parallel calls",
            category,
            Advanced,
            parallel_mixed,
        ),
        RegisteredTest::new(
            "high_fanout",
            "Capability queries at four times the configured width all succeed",
            category,
            Advanced,
            high_fanout,
        ),
    ];
    for test in tests {
        registry.register(test)?;
    }
    Ok(())
}

async fn fan_out(ctx: &TestContext, method: Method, width: usize) -> TestResult {
    let started = Instant::now();
    let (results, outcome) = ctx
        .concurrency()
        .run_parallel(&ctx.client, width, method)
        .await;
    match outcome {
        Ok(()) => TestResult::pass(method.as_str(), started.elapsed())
            .with_details(format!("{} parallel calls", results.len())),
        Err(e) => {
            let first = results
                .iter()
                .find_map(|r| r.error.as_deref())
                .map(|error| format!("first error: {}", error))
                .unwrap_or_default();
            TestResult::fail(method.as_str(), e.to_string(), started.elapsed()).with_details(first)
        }
    }
}

async fn parallel_name(ctx: TestContext) -> TestResult {
    fan_out(&ctx, Method::Name, ctx.config.parallel_requests).await
}

async fn consistent_responses(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let width = ctx.config.parallel_requests;
    match ctx
        .concurrency()
        .validate_consistent_responses(&ctx.client, width)
        .await
    {
        Ok(()) => TestResult::pass(Method::Name.as_str(), started.elapsed())
            .with_details(format!("{} identical answers", width)),
        Err(e) => TestResult::fail(Method::Name.as_str(), e.to_string(), started.elapsed()),
    }
}

async fn parallel_mixed(ctx: TestContext) -> TestResult {
    let started = Instant::now();
    let validator = ctx.concurrency();
    let width = ctx.config.parallel_requests;

    let mut failures = Vec::new();
    let mut exercised = 0;
    let mut not_implemented = Vec::new();
    for method in validator.table().methods() {
        if !method.is_core() && answers_unimplemented(&validator, &ctx.client, method).await {
            not_implemented.push(method.as_str());
            continue;
        }
        exercised += 1;
        let (_, outcome) = validator.run_parallel(&ctx.client, width, method).await;
        if let Err(e) = outcome {
            failures.push(format!("{}: {}", method, e));
        }
    }

    if !failures.is_empty() {
        return TestResult::fail("mixed", failures.join("; "), started.elapsed());
    }
    let mut details = format!("{} methods x {} parallel calls", exercised, width);
    if !not_implemented.is_empty() {
        details.push_str(&format!("; not implemented: {}", not_implemented.join(", ")));
    }
    TestResult::pass("mixed", started.elapsed()).with_details(details)
}

/// One call of an extension method; `Unimplemented` means the plugin opted out.
async fn answers_unimplemented(
    validator: &ConcurrencyValidator,
    client: &PluginClient,
    method: Method,
) -> bool {
    let Some(invoker) = validator.table().get(method).cloned() else {
        return false;
    };
    matches!(invoker(client.clone()).await, Err(status) if status.code == Code::Unimplemented)
}

async fn high_fanout(ctx: TestContext) -> TestResult {
    let width = ctx.config.parallel_requests.saturating_mul(HIGH_FANOUT_FACTOR);
    fan_out(&ctx, Method::Supports, width).await
}
