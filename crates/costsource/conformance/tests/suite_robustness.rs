use async_trait::async_trait;
use costsource_conformance::*;
use costsource_mock::MockPlugin;
use costsource_transport::InProcessHarness;
use costsource_types::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers its name with a new value on every call.
#[derive(Default)]
struct DriftingPlugin {
    calls: AtomicU64,
}

#[async_trait]
impl CostSource for DriftingPlugin {
    async fn name(&self) -> CallResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("drifting-{}", n))
    }

    async fn supports(&self, _request: SupportsRequest) -> CallResult<SupportsResponse> {
        Ok(SupportsResponse::supported())
    }

    async fn get_projected_cost(
        &self,
        _request: ProjectedCostRequest,
    ) -> CallResult<ProjectedCostResponse> {
        Err(Status::unimplemented("no projections"))
    }

    async fn get_actual_cost(&self, _request: ActualCostRequest) -> CallResult<ActualCostResponse> {
        Err(Status::unimplemented("no history"))
    }

    async fn get_pricing_spec(&self, _request: PricingSpecRequest) -> CallResult<PricingSpec> {
        Err(Status::unimplemented("no pricing"))
    }
}

async fn panicking(_ctx: TestContext) -> TestResult {
    panic!("boom")
}

async fn sleeping(_ctx: TestContext) -> TestResult {
    tokio::time::sleep(Duration::from_secs(30)).await;
    TestResult::pass("Name", Duration::from_secs(30))
}

async fn healthy(ctx: TestContext) -> TestResult {
    match ctx.client.name().await {
        Ok(_) => TestResult::pass("Name", Duration::ZERO),
        Err(status) => TestResult::from_status("Name", &status, Duration::ZERO),
    }
}

#[tokio::test]
async fn panicking_test_is_recorded_and_the_run_continues() {
    let mut registry = TestRegistry::new();
    registry
        .register(RegisteredTest::new(
            "panics",
            "panics",
            TestCategory::RpcCorrectness,
            ConformanceLevel::Basic,
            panicking,
        ))
        .unwrap();
    registry
        .register(RegisteredTest::new(
            "after_panic",
            "runs after the panic",
            TestCategory::RpcCorrectness,
            ConformanceLevel::Basic,
            healthy,
        ))
        .unwrap();

    let suite = ConformanceSuite::new(Arc::new(MockPlugin::new()), SuiteConfig::default())
        .await
        .unwrap()
        .with_registry(registry);
    let result = suite.run().await;
    suite.shutdown().await;

    let rpc = result.category(TestCategory::RpcCorrectness).unwrap();
    assert_eq!(rpc.failed, 1);
    assert_eq!(rpc.passed, 1);
    let failure = &rpc.results[0];
    assert_eq!(failure.name, "panics");
    assert_eq!(failure.method, "suite");
    assert!(failure.error.as_deref().unwrap().contains("test panicked: boom"));
}

#[tokio::test]
async fn hung_test_times_out_as_a_failure() {
    let mut registry = TestRegistry::new();
    registry
        .register(RegisteredTest::new(
            "hangs",
            "never returns in time",
            TestCategory::RpcCorrectness,
            ConformanceLevel::Basic,
            sleeping,
        ))
        .unwrap();
    let config = SuiteConfig::default().with_test_timeout(Duration::from_millis(100));

    let suite = ConformanceSuite::new(Arc::new(MockPlugin::new()), config)
        .await
        .unwrap()
        .with_registry(registry);
    let started = std::time::Instant::now();
    let result = suite.run().await;
    suite.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.summary.failed, 1);
    let failure = result.failures().next().unwrap();
    let error = failure.error.as_deref().unwrap();
    assert!(error.contains("DeadlineExceeded"), "{}", error);
    assert!(error.contains("limit is 100ms"), "{}", error);
    assert_eq!(failure.name, "hangs");
    assert_eq!(failure.method, "suite");
}

#[tokio::test]
async fn slow_plugin_call_is_cut_by_the_test_timeout() {
    let plugin = MockPlugin::builder()
        .fixed_delay(Method::GetPricingSpec, Duration::from_secs(5))
        .build()
        .unwrap();
    let config = SuiteConfig::for_level(ConformanceLevel::Basic)
        .with_test_timeout(Duration::from_millis(200));

    let result = run_with_config(Arc::new(plugin), config).await.unwrap();

    let failure = result
        .failures()
        .find(|r| r.name == "pricing_spec_schema")
        .expect("pricing spec check should time out");
    assert!(failure
        .error
        .as_deref()
        .unwrap()
        .contains("DeadlineExceeded"));
    assert!(failure.duration < Duration::from_secs(5));
    assert_eq!(result.level_achieved, ConformanceLevel::Basic);
}

#[tokio::test]
async fn suite_timeout_fails_tests_that_never_started() {
    let mut registry = TestRegistry::new();
    registry
        .register(RegisteredTest::new(
            "hangs",
            "outlives the suite",
            TestCategory::RpcCorrectness,
            ConformanceLevel::Basic,
            sleeping,
        ))
        .unwrap();
    registry
        .register(RegisteredTest::new(
            "too_late",
            "starts after the suite deadline",
            TestCategory::RpcCorrectness,
            ConformanceLevel::Basic,
            healthy,
        ))
        .unwrap();
    let config = SuiteConfig::default()
        .with_test_timeout(Duration::from_secs(10))
        .with_suite_timeout(Duration::from_secs(1));

    let suite = ConformanceSuite::new(Arc::new(MockPlugin::new()), config)
        .await
        .unwrap()
        .with_registry(registry);
    let result = suite.run().await;
    suite.shutdown().await;

    assert_eq!(result.summary.failed, 2);
    assert!(result.duration < Duration::from_secs(5));
    let late = result.failures().find(|r| r.name == "too_late").unwrap();
    assert!(late.error.as_deref().unwrap().contains("suite timeout"));
    assert_eq!(late.method, "suite");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let mut suite = ConformanceSuite::new(Arc::new(MockPlugin::new()), SuiteConfig::default())
        .await
        .unwrap();
    let before = suite.registry().len();

    let err = suite
        .register(RegisteredTest::new(
            "name_present",
            "shadows a built-in test",
            TestCategory::SpecValidation,
            ConformanceLevel::Basic,
            healthy,
        ))
        .unwrap_err();

    assert!(matches!(
        err,
        SuiteError::Registry(RegistryError::DuplicateTest(ref name)) if name == "name_present"
    ));
    assert_eq!(suite.registry().len(), before);
    suite.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_rejected_before_the_harness_starts() {
    let config = SuiteConfig::default().with_parallel_requests(0);
    let err = ConformanceSuite::new(Arc::new(MockPlugin::new()), config)
        .await
        .unwrap_err();
    assert!(matches!(err, SuiteError::Config(_)));
}

#[tokio::test]
async fn category_run_touches_only_that_category() {
    let plugin = Arc::new(MockPlugin::new());
    let suite = ConformanceSuite::new(
        plugin.clone(),
        SuiteConfig::for_level(ConformanceLevel::Standard),
    )
    .await
    .unwrap();

    let spec = suite.run_category(TestCategory::SpecValidation).await;
    suite.shutdown().await;

    assert_eq!(spec.category, TestCategory::SpecValidation);
    assert_eq!(spec.failed, 0, "{:?}", spec.failures().collect::<Vec<_>>());
    assert_eq!(spec.total(), 5);
    assert_eq!(plugin.call_count(Method::Supports), 0);
    assert_eq!(plugin.call_count(Method::GetActualCost), 0);
    assert!(plugin.call_count(Method::GetPricingSpec) > 0);
}

#[tokio::test]
async fn category_runs_fold_into_one_report() {
    let plugin = MockPlugin::new();
    plugin.inject_error(Method::GetPricingSpec, Status::unavailable("pricing offline"));
    let suite = ConformanceSuite::new(
        Arc::new(plugin),
        SuiteConfig::for_level(ConformanceLevel::Standard),
    )
    .await
    .unwrap();

    let result = suite
        .run_categories(&[TestCategory::SpecValidation, TestCategory::RpcCorrectness])
        .await;
    suite.shutdown().await;

    assert_eq!(result.categories.len(), 2);
    assert!(result.category(TestCategory::Performance).is_none());
    assert_eq!(result.plugin_name, "mock-cost-source");
    let failed: usize = result.categories.values().map(|c| c.failed).sum();
    assert!(failed > 0);
    assert_eq!(result.summary.failed, failed);
    assert_eq!(result.level_achieved, ConformanceLevel::Basic);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_identity_calls_agree() {
    let plugin = Arc::new(MockPlugin::new());
    let mut harness = InProcessHarness::new(plugin.clone());
    let client = harness.start().await.unwrap();
    let validator = ConcurrencyValidator::new(
        InvokerTable::standard(&ProbeConfig::default()),
        Duration::from_secs(5),
    );

    validator
        .validate_consistent_responses(&client, 32)
        .await
        .unwrap();
    let (results, outcome) = validator.run_parallel(&client, 16, Method::Supports).await;
    outcome.unwrap();
    assert_eq!(results.len(), 16);
    assert!(results.iter().all(|r| r.success));

    harness.stop().await;
    assert_eq!(plugin.call_count(Method::Name), 32);
    assert_eq!(plugin.call_count(Method::Supports), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drifting_identity_is_inconsistent() {
    let mut harness = InProcessHarness::new(Arc::new(DriftingPlugin::default()));
    let client = harness.start().await.unwrap();
    let validator = ConcurrencyValidator::new(
        InvokerTable::standard(&ProbeConfig::default()),
        Duration::from_secs(5),
    );

    let err = validator
        .validate_consistent_responses(&client, 8)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ConcurrencyError::Inconsistent {
            distinct: 8,
            width: 8
        }
    );
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_failures_are_counted() {
    let plugin = MockPlugin::new();
    plugin.inject_error(Method::GetProjectedCost, Status::unavailable("throttled"));
    let mut harness = InProcessHarness::new(Arc::new(plugin));
    let client = harness.start().await.unwrap();
    let validator = ConcurrencyValidator::new(
        InvokerTable::standard(&ProbeConfig::default()),
        Duration::from_secs(5),
    );

    let (results, outcome) = validator
        .run_parallel(&client, 12, Method::GetProjectedCost)
        .await;
    assert_eq!(results.len(), 12);
    assert_eq!(
        outcome.unwrap_err(),
        ConcurrencyError::Failures {
            failed: 12,
            width: 12
        }
    );

    let (_, unknown) = validator.run_parallel(&client, 4, Method::DryRun).await;
    assert_eq!(
        unknown.unwrap_err(),
        ConcurrencyError::UnsupportedMethod(Method::DryRun)
    );
    let (_, zero) = validator.run_parallel(&client, 0, Method::Name).await;
    assert_eq!(zero.unwrap_err(), ConcurrencyError::InvalidWidth(0));
    harness.stop().await;
}

#[tokio::test]
async fn drifting_plugin_fails_the_consistency_check_in_a_run() {
    let suite = ConformanceSuite::new(
        Arc::new(DriftingPlugin::default()),
        SuiteConfig::for_level(ConformanceLevel::Standard),
    )
    .await
    .unwrap();

    let concurrency = suite.run_category(TestCategory::Concurrency).await;
    suite.shutdown().await;

    let consistent = concurrency
        .results
        .iter()
        .find(|r| r.name == "consistent_responses")
        .unwrap();
    assert!(!consistent.success);
    assert!(consistent
        .error
        .as_deref()
        .unwrap()
        .contains("distinct responses"));
}
