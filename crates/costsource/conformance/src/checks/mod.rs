//! Built-in conformance tests, one module per category.

pub mod concurrency;
pub mod performance;
pub mod rpc_correctness;
pub mod spec_validation;

use crate::error::RegistryError;
use crate::registry::TestRegistry;
use crate::result::TestResult;
use crate::validation::ValidationResult;
use costsource_types::{CallResult, Code, Method};
use std::time::Instant;

/// Provider no catalog knows about.
pub(crate) const INVALID_PROVIDER: &str = "conformance-invalid-provider";

/// Every built-in test, in category order.
pub fn default_registry() -> Result<TestRegistry, RegistryError> {
    let mut registry = TestRegistry::new();
    spec_validation::register(&mut registry)?;
    rpc_correctness::register(&mut registry)?;
    performance::register(&mut registry)?;
    concurrency::register(&mut registry)?;
    Ok(registry)
}

/// Pass when `validation` has no errors; warnings go into the details.
pub(crate) fn from_validation(
    method: Method,
    validation: &ValidationResult,
    started: Instant,
) -> TestResult {
    let elapsed = started.elapsed();
    if !validation.is_valid() {
        return TestResult::fail(method.as_str(), validation.errors_text(), elapsed);
    }
    let result = TestResult::pass(method.as_str(), elapsed);
    if validation.warnings.is_empty() {
        result
    } else {
        result.with_details(format!("warnings: {}", validation.warnings_text()))
    }
}

/// Pass when the call was rejected with one of `codes`.
pub(crate) fn expect_rejection<T>(
    method: Method,
    outcome: CallResult<T>,
    codes: &[Code],
    started: Instant,
) -> TestResult {
    let elapsed = started.elapsed();
    match outcome {
        Ok(_) => TestResult::fail(
            method.as_str(),
            format!("expected {} to be rejected, it succeeded", method),
            elapsed,
        ),
        Err(status) if codes.contains(&status.code) => {
            TestResult::pass(method.as_str(), elapsed).with_details(status.to_string())
        }
        Err(status) => TestResult::fail(
            method.as_str(),
            format!(
                "expected one of [{}], got {}",
                codes
                    .iter()
                    .map(Code::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                status
            ),
            elapsed,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{ConformanceLevel, TestCategory};
    use costsource_types::Status;

    #[test]
    fn default_registry_registers_every_category() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.categories(), TestCategory::all().to_vec());
        for level in ConformanceLevel::all() {
            assert!(
                registry.tests().iter().any(|t| t.min_level == *level),
                "no test at {}",
                level
            );
        }
    }

    #[test]
    fn basic_tests_never_need_higher_levels() {
        let registry = default_registry().unwrap();
        let basic = registry
            .tests()
            .iter()
            .filter(|t| t.applies_to(ConformanceLevel::Basic))
            .count();
        assert!(basic > 0);
        assert!(basic < registry.len());
    }

    #[test]
    fn rejection_codes() {
        let started = Instant::now();
        let ok = expect_rejection::<()>(
            Method::GetProjectedCost,
            Err(Status::not_found("nope")),
            &[Code::NotFound, Code::InvalidArgument],
            started,
        );
        assert!(ok.success);

        let wrong = expect_rejection::<()>(
            Method::GetProjectedCost,
            Err(Status::internal("crash")),
            &[Code::NotFound],
            started,
        );
        assert!(!wrong.success);
        assert!(wrong.error.unwrap().contains("NotFound"));

        let accepted = expect_rejection(Method::GetActualCost, Ok(()), &[Code::NotFound], started);
        assert!(!accepted.success);
    }
}
