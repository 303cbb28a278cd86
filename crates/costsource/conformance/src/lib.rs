//! Tiered conformance suite for cost-source plugins.
//!
//! Runs a registry of categorized tests against a plugin through the
//! in-process harness and certifies it at Basic, Standard or Advanced.
//!
//! ```rust,ignore
//! let result = costsource_conformance::run_standard(Arc::new(plugin)).await?;
//! print_report(&result, &mut std::io::stdout())?;
//! assert!(result.passed());
//! ```
//!
//! Tests run one after another, each on its own task with a timeout. A test
//! that fails, hangs or panics becomes a failed [`TestResult`]; only harness
//! setup and configuration errors abort a run.

#![deny(unsafe_code)]

pub mod checks;
pub mod concurrency;
pub mod config;
pub mod durations;
pub mod error;
pub mod level;
pub mod performance;
pub mod registry;
pub mod report;
pub mod result;
pub mod suite;
pub mod telemetry;
pub mod validation;

pub use concurrency::{ConcurrencyValidator, Invoker, InvokerTable};
pub use config::{LoggingConfig, ProbeConfig, SuiteConfig};
pub use error::{ConcurrencyError, RegistryError, SuiteError, SuiteResult};
pub use level::{resolve_level_achieved, ConformanceLevel, TestCategory};
pub use performance::{PerformanceBaseline, PerformanceResult};
pub use registry::{RegisteredTest, TestContext, TestRegistry};
pub use report::{print_report, ConformanceResult, ResultAggregator, REPORT_VERSION};
pub use result::{CategoryResult, Summary, TestResult};
pub use suite::{run_advanced, run_basic, run_standard, run_with_config, ConformanceSuite};
pub use telemetry::init_tracing;
pub use validation::{SpecValidator, ValidationCatalog, ValidationResult};
