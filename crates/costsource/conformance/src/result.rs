//! Per-test and per-category results.

use crate::durations::serde_string;
use crate::level::TestCategory;
use costsource_types::Status;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const UNEXPLAINED_FAILURE: &str = "test failed without reporting an error";

/// Outcome of one executed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Registered test name. Filled in by the suite.
    #[serde(default)]
    pub name: String,
    /// Operation the test exercised.
    pub method: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "serde_string")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl TestResult {
    pub fn pass(method: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: String::new(),
            method: method.into(),
            success: true,
            error: None,
            duration,
            details: String::new(),
        }
    }

    /// A failure always carries an error; a blank one is replaced with a
    /// generic message.
    pub fn fail(method: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        let error = error.into();
        Self {
            name: String::new(),
            method: method.into(),
            success: false,
            error: Some(if error.trim().is_empty() {
                UNEXPLAINED_FAILURE.to_string()
            } else {
                error
            }),
            duration,
            details: String::new(),
        }
    }

    /// Failure from a call status, keeping the code in the message.
    pub fn from_status(method: impl Into<String>, status: &Status, duration: Duration) -> Self {
        Self::fail(method, status.to_string(), duration)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restore the actionable-failure invariant on a hand-built result.
    pub fn normalized(mut self) -> Self {
        let blank_error = self
            .error
            .as_deref()
            .map_or(true, |e| e.trim().is_empty());
        if !self.success && blank_error && self.details.trim().is_empty() {
            self.error = Some(UNEXPLAINED_FAILURE.to_string());
        }
        self
    }

    /// Whether a failed result explains itself.
    pub fn is_actionable(&self) -> bool {
        self.success
            || self.error.as_deref().is_some_and(|e| !e.trim().is_empty())
            || !self.details.trim().is_empty()
    }
}

/// Results folded for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: TestCategory,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Executed tests in run order.
    pub results: Vec<TestResult>,
    /// Names of tests above the target level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_tests: Vec<String>,
}

impl CategoryResult {
    pub fn new(category: TestCategory) -> Self {
        Self {
            category,
            passed: 0,
            failed: 0,
            skipped: 0,
            results: Vec::new(),
            skipped_tests: Vec::new(),
        }
    }

    pub fn record(&mut self, result: TestResult) {
        let result = result.normalized();
        if result.success {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn record_skip(&mut self, name: impl Into<String>) {
        self.skipped += 1;
        self.skipped_tests.push(name.into());
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Run-level counts, the sum over categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_categories<'a>(categories: impl IntoIterator<Item = &'a CategoryResult>) -> Self {
        categories
            .into_iter()
            .fold(Summary::default(), |mut acc, category| {
                acc.passed += category.passed;
                acc.failed += category.failed;
                acc.skipped += category.skipped;
                acc.total += category.total();
                acc
            })
    }
}
