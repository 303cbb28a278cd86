//! Conformance suite runner

use crate::checks;
use crate::config::SuiteConfig;
use crate::durations::format_duration;
use crate::error::SuiteResult;
use crate::level::{ConformanceLevel, TestCategory};
use crate::registry::{RegisteredTest, TestContext, TestRegistry};
use crate::report::{ConformanceResult, ResultAggregator};
use crate::result::{CategoryResult, TestResult};
use crate::validation::ValidationCatalog;
use costsource_transport::{InProcessHarness, PluginClient};
use costsource_types::CostSource;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const UNKNOWN_PLUGIN: &str = "unknown";
/// Method recorded on results the runner builds itself.
const SUITE_METHOD: &str = "suite";

/// One plugin, one harness, one registry.
///
/// The harness is started in [`ConformanceSuite::new`] and owned by the
/// suite until [`ConformanceSuite::shutdown`].
pub struct ConformanceSuite {
    config: Arc<SuiteConfig>,
    registry: TestRegistry,
    catalog: Arc<ValidationCatalog>,
    harness: InProcessHarness,
    client: PluginClient,
}

impl ConformanceSuite {
    /// Validate the configuration and bring the transport up.
    ///
    /// Fails when the configuration is invalid or the harness cannot start;
    /// no test runs in either case.
    pub async fn new(service: Arc<dyn CostSource>, config: SuiteConfig) -> SuiteResult<Self> {
        config.validate()?;

        let mut harness = InProcessHarness::builder()
            .service(service)
            .default_timeout(config.test_timeout())
            .build()?;
        let client = harness.start().await?;

        Ok(Self {
            config: Arc::new(config),
            registry: checks::default_registry()?,
            catalog: Arc::new(ValidationCatalog::default()),
            harness,
            client,
        })
    }

    /// Replace the registered tests.
    pub fn with_registry(mut self, registry: TestRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_catalog(mut self, catalog: ValidationCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Add one test after the registered ones.
    pub fn register(&mut self, test: RegisteredTest) -> SuiteResult<()> {
        self.registry.register(test)?;
        Ok(())
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn client(&self) -> &PluginClient {
        &self.client
    }

    /// Run every registered test up to the target level.
    ///
    /// Test failures, timeouts and panics are recorded, never returned.
    pub async fn run(&self) -> ConformanceResult {
        let started = std::time::Instant::now();
        let target = self.config.target_level;
        let deadline = self.config.suite_timeout().map(|t| Instant::now() + t);
        let plugin_name = self.plugin_name().await;

        tracing::info!(
            plugin = %plugin_name,
            target = %target,
            tests = self.registry.len(),
            "Starting conformance run"
        );

        let mut aggregator = ResultAggregator::new(plugin_name, target);
        for test in self.registry.tests() {
            if !test.applies_to(target) {
                tracing::debug!(
                    test = %test.name,
                    min_level = %test.min_level,
                    "Skipping test above target level"
                );
                aggregator.record_skip(test.category, &test.name);
                continue;
            }
            let result = self.execute(test, deadline).await;
            aggregator.record(test.category, result);
        }

        let result = aggregator.finish(started.elapsed());
        tracing::info!(
            plugin = %result.plugin_name,
            passed = result.summary.passed,
            failed = result.summary.failed,
            skipped = result.summary.skipped,
            achieved = %result.level_achieved,
            "Conformance run complete"
        );
        result
    }

    /// Run only the tests of one category, still gated by the target level.
    pub async fn run_category(&self, category: TestCategory) -> CategoryResult {
        let target = self.config.target_level;
        let deadline = self.config.suite_timeout().map(|t| Instant::now() + t);
        tracing::info!(category = %category, target = %target, "Running category");

        let mut result = CategoryResult::new(category);
        for test in self.registry.in_category(category) {
            if !test.applies_to(target) {
                result.record_skip(&test.name);
                continue;
            }
            result.record(self.execute(test, deadline).await);
        }
        result
    }

    /// Run several categories and fold them into one report.
    ///
    /// The achieved level only reflects the categories that ran.
    pub async fn run_categories(&self, categories: &[TestCategory]) -> ConformanceResult {
        let started = std::time::Instant::now();
        let plugin_name = self.plugin_name().await;
        let mut aggregator = ResultAggregator::new(plugin_name, self.config.target_level);
        for category in categories {
            aggregator.insert_category(self.run_category(*category).await);
        }
        tracing::info!(
            categories = categories.len(),
            failed = aggregator.failed(),
            "Category run complete"
        );
        aggregator.finish(started.elapsed())
    }

    /// Stop the harness.
    pub async fn shutdown(mut self) {
        self.harness.stop().await;
    }

    async fn plugin_name(&self) -> String {
        let fallback = || {
            self.config
                .plugin_label
                .clone()
                .unwrap_or_else(|| UNKNOWN_PLUGIN.to_string())
        };
        match self.client.name().await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => {
                tracing::warn!("Plugin reported an empty name");
                fallback()
            }
            Err(status) => {
                tracing::warn!(error = %status, "Plugin name probe failed");
                fallback()
            }
        }
    }

    /// Run one test on its own task, bounded by the per-test timeout and
    /// whatever is left of the suite deadline.
    async fn execute(&self, test: &RegisteredTest, deadline: Option<Instant>) -> TestResult {
        let mut allowed = self.config.test_timeout();
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(test = %test.name, "Suite timeout reached before test started");
                return TestResult::fail(
                    SUITE_METHOD,
                    "suite timeout exceeded before the test started",
                    Duration::ZERO,
                )
                .with_name(&test.name);
            }
            allowed = allowed.min(remaining);
        }

        tracing::debug!(test = %test.name, category = %test.category, "Running test");
        let ctx = TestContext::new(
            self.client.with_deadline(Instant::now() + allowed),
            self.config.clone(),
            self.catalog.clone(),
        );

        let started = std::time::Instant::now();
        let mut handle = tokio::spawn((test.run)(ctx));
        let result = match tokio::time::timeout(allowed, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                tracing::warn!(test = %test.name, panic = %message, "Test panicked");
                TestResult::fail(
                    SUITE_METHOD,
                    format!("test panicked: {}", message),
                    started.elapsed(),
                )
            }
            Ok(Err(e)) => TestResult::fail(
                SUITE_METHOD,
                format!("test task did not finish: {}", e),
                started.elapsed(),
            ),
            Err(_) => {
                handle.abort();
                let elapsed = started.elapsed();
                tracing::warn!(
                    test = %test.name,
                    elapsed = %format_duration(elapsed),
                    allowed = %format_duration(allowed),
                    "Test timed out"
                );
                TestResult::fail(
                    SUITE_METHOD,
                    format!(
                        "DeadlineExceeded: test ran for {}, limit is {}",
                        format_duration(elapsed),
                        format_duration(allowed)
                    ),
                    elapsed,
                )
            }
        };

        if !result.success {
            tracing::debug!(
                test = %test.name,
                error = result.error.as_deref().unwrap_or_default(),
                "Test failed"
            );
        }
        result.with_name(&test.name)
    }
}

impl std::fmt::Debug for ConformanceSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConformanceSuite")
            .field("config", &self.config)
            .field("tests", &self.registry.len())
            .field("harness", &self.harness)
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run the built-in tests against `service` with `config`, then stop the
/// harness.
pub async fn run_with_config(
    service: Arc<dyn CostSource>,
    config: SuiteConfig,
) -> SuiteResult<ConformanceResult> {
    let suite = ConformanceSuite::new(service, config).await?;
    let result = suite.run().await;
    suite.shutdown().await;
    Ok(result)
}

pub async fn run_basic(service: Arc<dyn CostSource>) -> SuiteResult<ConformanceResult> {
    run_with_config(service, SuiteConfig::for_level(ConformanceLevel::Basic)).await
}

pub async fn run_standard(service: Arc<dyn CostSource>) -> SuiteResult<ConformanceResult> {
    run_with_config(service, SuiteConfig::for_level(ConformanceLevel::Standard)).await
}

pub async fn run_advanced(service: Arc<dyn CostSource>) -> SuiteResult<ConformanceResult> {
    run_with_config(service, SuiteConfig::for_level(ConformanceLevel::Advanced)).await
}
