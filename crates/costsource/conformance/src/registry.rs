//! Named, categorized, level-gated tests.

use crate::concurrency::{ConcurrencyValidator, InvokerTable};
use crate::config::SuiteConfig;
use crate::error::RegistryError;
use crate::level::{ConformanceLevel, TestCategory};
use crate::result::TestResult;
use crate::validation::{SpecValidator, ValidationCatalog};
use costsource_transport::PluginClient;
use costsource_types::ResourceDescriptor;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// What a test gets to work with.
#[derive(Clone)]
pub struct TestContext {
    pub client: PluginClient,
    pub config: Arc<SuiteConfig>,
    pub catalog: Arc<ValidationCatalog>,
}

impl TestContext {
    pub fn new(
        client: PluginClient,
        config: Arc<SuiteConfig>,
        catalog: Arc<ValidationCatalog>,
    ) -> Self {
        Self {
            client,
            config,
            catalog,
        }
    }

    pub fn target_level(&self) -> ConformanceLevel {
        self.config.target_level
    }

    pub fn probe(&self) -> ResourceDescriptor {
        self.config.probe.resource()
    }

    pub fn validator(&self) -> SpecValidator<'_> {
        SpecValidator::new(&self.catalog)
    }

    /// Fan-out helper bounded by the test timeout.
    pub fn concurrency(&self) -> ConcurrencyValidator {
        ConcurrencyValidator::new(
            InvokerTable::standard(&self.config.probe),
            self.config.test_timeout(),
        )
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("client", &self.client)
            .field("target_level", &self.config.target_level)
            .finish()
    }
}

pub type TestFn = Arc<dyn Fn(TestContext) -> BoxFuture<'static, TestResult> + Send + Sync>;

/// A registered test. Immutable once registered.
#[derive(Clone)]
pub struct RegisteredTest {
    pub name: String,
    pub description: String,
    pub category: TestCategory,
    pub min_level: ConformanceLevel,
    pub run: TestFn,
}

impl RegisteredTest {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        category: TestCategory,
        min_level: ConformanceLevel,
        test: F,
    ) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            min_level,
            run: Arc::new(move |ctx: TestContext| test(ctx).boxed()),
        }
    }

    /// Whether a run targeting `target` executes this test.
    pub fn applies_to(&self, target: ConformanceLevel) -> bool {
        self.min_level <= target
    }
}

impl std::fmt::Debug for RegisteredTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTest")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("min_level", &self.min_level)
            .finish()
    }
}

/// Tests in registration order, names unique.
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    tests: Vec<RegisteredTest>,
    names: HashSet<String>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, test: RegisteredTest) -> Result<(), RegistryError> {
        if !self.names.insert(test.name.clone()) {
            return Err(RegistryError::DuplicateTest(test.name));
        }
        self.tests.push(test);
        Ok(())
    }

    pub fn tests(&self) -> &[RegisteredTest] {
        &self.tests
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTest> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn in_category(&self, category: TestCategory) -> impl Iterator<Item = &RegisteredTest> {
        self.tests.iter().filter(move |t| t.category == category)
    }

    pub fn categories(&self) -> Vec<TestCategory> {
        TestCategory::all()
            .iter()
            .copied()
            .filter(|c| self.tests.iter().any(|t| t.category == *c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
