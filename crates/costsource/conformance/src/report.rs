//! Conformance result aggregation and reporting

use crate::durations::{format_duration, serde_string};
use crate::level::{resolve_level_achieved, ConformanceLevel, TestCategory};
use crate::result::{CategoryResult, Summary, TestResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;
use uuid::Uuid;

/// Version of the report schema.
pub const REPORT_VERSION: &str = "1.0.0";

/// Terminal artifact of a run. Frozen once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceResult {
    pub version: String,
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub plugin_name: String,
    pub level_achieved: ConformanceLevel,
    pub target_level: ConformanceLevel,
    pub summary: Summary,
    pub categories: BTreeMap<TestCategory, CategoryResult>,
    #[serde(with = "serde_string")]
    pub duration: Duration,
}

impl ConformanceResult {
    /// The single CI gate: nothing failed.
    pub fn passed(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn category(&self, category: TestCategory) -> Option<&CategoryResult> {
        self.categories.get(&category)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.categories.values().flat_map(CategoryResult::failures)
    }

    /// Generate JSON report
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("╔════════════════════════════════════════════════════════════╗\n");
        output.push_str("║  Cost Source Plugin Conformance Report                     ║\n");
        output.push_str("╠════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!("║  Plugin: {:<49} ║\n", self.plugin_name));
        output.push_str(&format!(
            "║  Timestamp: {:<46} ║\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!(
            "║  Duration: {:<47} ║\n",
            format_duration(self.duration)
        ));
        output.push_str(&format!(
            "║  Target: {:<10} Achieved: {:<28} ║\n",
            self.target_level.label(),
            self.level_achieved.label()
        ));
        output.push_str("╠════════════════════════════════════════════════════════════╣\n");

        for (category, result) in &self.categories {
            output.push_str(&format!(
                "║  {} ({} passed, {} failed, {} skipped)\n",
                category, result.passed, result.failed, result.skipped
            ));
            output.push_str("╟────────────────────────────────────────────────────────────╢\n");

            for test in &result.results {
                let icon = if test.success { "✓" } else { "✗" };
                output.push_str(&format!(
                    "║  {} {:<45} {:>9}\n",
                    icon,
                    test.name,
                    format_duration(test.duration)
                ));
                if let Some(error) = &test.error {
                    output.push_str(&format!("║      Error: {}\n", error));
                }
                if !test.details.is_empty() {
                    output.push_str(&format!("║      Details: {}\n", test.details));
                }
            }
            for name in &result.skipped_tests {
                output.push_str(&format!("║  ○ {}\n", name));
            }

            output.push_str("╟────────────────────────────────────────────────────────────╢\n");
        }

        output.push_str("╠════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║    Total: {:<5}  Passed: {:<5}  Failed: {:<5}  Skipped: {:<3} ║\n",
            self.summary.total, self.summary.passed, self.summary.failed, self.summary.skipped
        ));
        if self.passed() {
            output.push_str("║  Result: ✓ CONFORMANT                                      ║\n");
        } else {
            output.push_str("║  Result: ✗ NON-CONFORMANT                                  ║\n");
        }
        output.push_str("╚════════════════════════════════════════════════════════════╝\n");

        output
    }
}

/// Write the human-readable report. I/O errors go back to the caller and
/// never touch the result.
pub fn print_report(result: &ConformanceResult, writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(result.to_text().as_bytes())?;
    writer.flush()
}

/// Folds test outcomes into categories as a run progresses.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    plugin_name: String,
    target_level: ConformanceLevel,
    started_at: DateTime<Utc>,
    categories: BTreeMap<TestCategory, CategoryResult>,
}

impl ResultAggregator {
    pub fn new(plugin_name: impl Into<String>, target_level: ConformanceLevel) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            target_level,
            started_at: Utc::now(),
            categories: BTreeMap::new(),
        }
    }

    fn entry(&mut self, category: TestCategory) -> &mut CategoryResult {
        self.categories
            .entry(category)
            .or_insert_with(|| CategoryResult::new(category))
    }

    pub fn record(&mut self, category: TestCategory, result: TestResult) {
        self.entry(category).record(result);
    }

    pub fn record_skip(&mut self, category: TestCategory, name: impl Into<String>) {
        self.entry(category).record_skip(name);
    }

    /// Add a category produced by a category-only run.
    pub fn insert_category(&mut self, result: CategoryResult) {
        self.categories.insert(result.category, result);
    }

    pub fn failed(&self) -> usize {
        self.categories.values().map(|c| c.failed).sum()
    }

    /// Compute the summary and the achieved level, and freeze the result.
    pub fn finish(self, duration: Duration) -> ConformanceResult {
        let summary = Summary::from_categories(self.categories.values());
        ConformanceResult {
            version: REPORT_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            timestamp: self.started_at,
            plugin_name: self.plugin_name,
            level_achieved: resolve_level_achieved(self.target_level, summary.failed),
            target_level: self.target_level,
            summary,
            categories: self.categories,
            duration,
        }
    }
}
