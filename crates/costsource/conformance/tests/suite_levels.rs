use async_trait::async_trait;
use costsource_conformance::*;
use costsource_mock::MockPlugin;
use costsource_types::*;
use proptest::prelude::*;
use std::sync::Arc;

/// Serves the core operations from the mock and leaves every extension
/// at its default.
struct CoreOnlyPlugin(MockPlugin);

#[async_trait]
impl CostSource for CoreOnlyPlugin {
    async fn name(&self) -> CallResult<String> {
        self.0.name().await
    }

    async fn supports(&self, request: SupportsRequest) -> CallResult<SupportsResponse> {
        self.0.supports(request).await
    }

    async fn get_projected_cost(
        &self,
        request: ProjectedCostRequest,
    ) -> CallResult<ProjectedCostResponse> {
        self.0.get_projected_cost(request).await
    }

    async fn get_actual_cost(&self, request: ActualCostRequest) -> CallResult<ActualCostResponse> {
        self.0.get_actual_cost(request).await
    }

    async fn get_pricing_spec(&self, request: PricingSpecRequest) -> CallResult<PricingSpec> {
        self.0.get_pricing_spec(request).await
    }
}

#[tokio::test]
async fn basic_run_against_the_mock_passes() {
    let result = run_basic(Arc::new(MockPlugin::new())).await.unwrap();

    assert_eq!(result.summary.failed, 0, "{}", result.to_text());
    assert!(result.summary.passed > 0);
    assert_eq!(result.level_achieved, ConformanceLevel::Basic);
    assert_eq!(result.plugin_name, "mock-cost-source");
    assert!(result.passed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn standard_run_against_the_mock_passes() {
    let result = run_standard(Arc::new(MockPlugin::new())).await.unwrap();

    assert_eq!(result.summary.failed, 0, "{}", result.to_text());
    assert_eq!(result.level_achieved, ConformanceLevel::Standard);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn advanced_run_against_the_mock_passes() {
    let result = run_advanced(Arc::new(MockPlugin::new())).await.unwrap();

    assert_eq!(result.summary.failed, 0, "{}", result.to_text());
    assert_eq!(result.summary.skipped, 0);
    assert_eq!(result.level_achieved, ConformanceLevel::Advanced);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn injected_supports_error_drops_standard_to_basic() {
    let plugin = MockPlugin::new();
    plugin.inject_error(Method::Supports, Status::unavailable("capability index offline"));

    let result = run_standard(Arc::new(plugin)).await.unwrap();

    assert!(result.summary.failed >= 1);
    assert_eq!(result.level_achieved, ConformanceLevel::Basic);
    assert!(!result.passed());
    let failure = result
        .failures()
        .find(|r| r.name == "supports_valid_resource")
        .expect("supports_valid_resource should fail");
    assert!(failure
        .error
        .as_deref()
        .unwrap()
        .contains("capability index offline"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_extension_drops_advanced_to_standard() {
    let plugin = MockPlugin::new();
    plugin.inject_error(Method::GetRecommendations, Status::internal("model crashed"));

    let result = run_advanced(Arc::new(plugin)).await.unwrap();

    assert_eq!(result.summary.failed, 1, "{}", result.to_text());
    assert_eq!(result.level_achieved, ConformanceLevel::Standard);
}

#[tokio::test]
async fn tests_above_the_target_are_only_skipped() {
    let plugin = Arc::new(MockPlugin::new());
    let result = run_basic(plugin.clone()).await.unwrap();

    let performance = result.category(TestCategory::Performance).unwrap();
    assert_eq!(performance.passed + performance.failed, 0);
    assert!(performance.results.is_empty());
    assert_eq!(performance.skipped, performance.skipped_tests.len());
    assert!(performance.skipped > 0);

    let concurrency = result.category(TestCategory::Concurrency).unwrap();
    assert_eq!(concurrency.passed + concurrency.failed, 0);
    assert!(concurrency.skipped > 0);

    assert_eq!(plugin.call_count(Method::DryRun), 0);
    assert_eq!(plugin.call_count(Method::GetBudgets), 0);
}

#[tokio::test]
async fn summary_is_the_sum_of_categories() {
    let result = run_basic(Arc::new(MockPlugin::new())).await.unwrap();

    let passed: usize = result.categories.values().map(|c| c.passed).sum();
    let failed: usize = result.categories.values().map(|c| c.failed).sum();
    let skipped: usize = result.categories.values().map(|c| c.skipped).sum();
    assert_eq!(result.summary.passed, passed);
    assert_eq!(result.summary.failed, failed);
    assert_eq!(result.summary.skipped, skipped);
    assert_eq!(result.summary.total, passed + failed + skipped);
}

#[tokio::test]
async fn report_json_carries_the_required_keys() {
    let result = run_basic(Arc::new(MockPlugin::new())).await.unwrap();
    let json = result.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    for key in [
        "version",
        "timestamp",
        "plugin_name",
        "level_achieved",
        "summary",
        "categories",
        "duration",
    ] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
    for key in ["total", "passed", "failed", "skipped"] {
        assert!(value["summary"].get(key).is_some(), "missing summary.{}", key);
    }
    assert_eq!(value["version"], REPORT_VERSION);
    assert_eq!(value["level_achieved"], "basic");
    assert!(value["duration"].is_string());
    assert!(value["categories"].get("spec_validation").is_some());

    let parsed = ConformanceResult::from_json(&json).unwrap();
    assert_eq!(parsed.summary, result.summary);
    assert_eq!(parsed.level_achieved, result.level_achieved);
}

#[tokio::test]
async fn text_report_renders() {
    let result = run_basic(Arc::new(MockPlugin::new())).await.unwrap();
    let mut out = Vec::new();
    print_report(&result, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("mock-cost-source"));
    assert!(text.contains("✓ name_present"));
    assert!(text.contains("CONFORMANT"));
}

#[tokio::test]
async fn legacy_plugin_fails_core_tests_but_completes() {
    let result = run_basic(Arc::new(UnimplementedCostSource::new("legacy")))
        .await
        .unwrap();

    assert_eq!(result.plugin_name, "legacy");
    assert!(result.summary.failed > 0);
    assert_eq!(result.level_achieved, ConformanceLevel::Basic);
    for failure in result.failures() {
        assert!(failure.is_actionable(), "{:?}", failure);
    }
    let spec = result.category(TestCategory::SpecValidation).unwrap();
    assert!(spec
        .results
        .iter()
        .any(|r| r.name == "name_present" && r.success));
    assert!(result
        .failures()
        .any(|r| r.error.as_deref().unwrap_or_default().contains("Unimplemented")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn core_only_plugin_reaches_advanced() {
    let result = run_advanced(Arc::new(CoreOnlyPlugin(MockPlugin::new())))
        .await
        .unwrap();

    assert_eq!(result.summary.failed, 0, "{}", result.to_text());
    assert_eq!(result.level_achieved, ConformanceLevel::Advanced);
    let concurrency = result.category(TestCategory::Concurrency).unwrap();
    let mixed = concurrency
        .results
        .iter()
        .find(|r| r.name == "parallel_mixed")
        .unwrap();
    assert!(mixed.success);
    assert!(mixed.details.contains("not implemented: EstimateCost"), "{}", mixed.details);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_extension_still_fails_parallel_mixed() {
    let plugin = MockPlugin::new();
    plugin.inject_error(Method::EstimateCost, Status::internal("estimator down"));

    let result = run_advanced(Arc::new(plugin)).await.unwrap();

    assert_eq!(result.level_achieved, ConformanceLevel::Standard);
    let mixed = result
        .failures()
        .find(|r| r.name == "parallel_mixed")
        .expect("parallel_mixed should fail");
    assert!(mixed.error.as_deref().unwrap().contains("EstimateCost"));
}

#[tokio::test]
async fn failing_name_call_uses_the_label() {
    let plugin = MockPlugin::new();
    plugin.inject_error(Method::Name, Status::unavailable("booting"));
    let mut config = SuiteConfig::for_level(ConformanceLevel::Basic);
    config.plugin_label = Some("fixture".to_string());

    let result = run_with_config(Arc::new(plugin), config).await.unwrap();

    assert_eq!(result.plugin_name, "fixture");
    assert!(result.failures().any(|r| r.name == "name_present"));
}

#[tokio::test]
async fn failing_name_call_without_label_reports_unknown() {
    let plugin = MockPlugin::new();
    plugin.inject_error(Method::Name, Status::unavailable("booting"));

    let result = run_basic(Arc::new(plugin)).await.unwrap();

    assert_eq!(result.plugin_name, "unknown");
    assert!(!result.passed());
}

proptest! {
    #[test]
    fn achieved_level_never_exceeds_target(target_idx in 0usize..3, failed in 0usize..50) {
        let target = ConformanceLevel::all()[target_idx];
        let achieved = resolve_level_achieved(target, failed);

        prop_assert!(achieved <= target);
        if failed == 0 {
            prop_assert_eq!(achieved, target);
        } else {
            match target {
                ConformanceLevel::Advanced => prop_assert_eq!(achieved, ConformanceLevel::Standard),
                _ => prop_assert_eq!(achieved, ConformanceLevel::Basic),
            }
        }
    }
}
