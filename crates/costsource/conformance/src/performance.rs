//! Latency measurement against per-method baselines.
//!
//! The engine only produces numbers. Deciding whether a test passed is left
//! to the caller.

use crate::durations::serde_string;
use costsource_types::{CallResult, Method};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

/// Iterations for ordinary operations.
pub const DEFAULT_ITERATIONS: usize = 100;

/// Iterations for expensive operations such as range queries.
pub const EXPENSIVE_ITERATIONS: usize = 50;

/// Allowed variance over the standard ceiling at the advanced level, percent.
pub const VARIANCE_TOLERANCE_PERCENT: f64 = 10.0;

/// Latency ceilings for one method. A zero ceiling means no requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PerformanceBaseline {
    pub method: Method,
    pub standard_latency: Duration,
    pub advanced_latency: Duration,
    /// Informational only; allocations are not measured.
    pub max_alloc_bytes: Option<u64>,
}

const fn baseline(method: Method, standard_ms: u64, advanced_ms: u64) -> PerformanceBaseline {
    PerformanceBaseline {
        method,
        standard_latency: Duration::from_millis(standard_ms),
        advanced_latency: Duration::from_millis(advanced_ms),
        max_alloc_bytes: None,
    }
}

pub const DEFAULT_BASELINES: [PerformanceBaseline; 6] = [
    baseline(Method::Name, 100, 50),
    baseline(Method::Supports, 50, 25),
    baseline(Method::GetProjectedCost, 200, 100),
    baseline(Method::GetPricingSpec, 200, 100),
    baseline(Method::GetActualCost, 2_000, 1_000),
    baseline(Method::EstimateCost, 500, 250),
];

pub fn baseline_for(method: Method) -> Option<&'static PerformanceBaseline> {
    DEFAULT_BASELINES.iter().find(|b| b.method == method)
}

/// Iterations a method is measured with.
pub fn iterations_for(method: Method) -> usize {
    match method {
        Method::GetActualCost => EXPENSIVE_ITERATIONS,
        _ => DEFAULT_ITERATIONS,
    }
}

/// Latency statistics for one measured operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub method: String,
    pub iterations: usize,
    #[serde(with = "serde_string")]
    pub min: Duration,
    #[serde(with = "serde_string")]
    pub avg: Duration,
    #[serde(with = "serde_string")]
    pub max: Duration,
    pub variance_percent: f64,
    pub standard_passed: bool,
    pub advanced_passed: bool,
    /// Calls that returned an error. Their latency is still counted.
    pub errors: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PerformanceResult {
    fn from_samples(
        name: &str,
        samples: &[Duration],
        errors: usize,
        last_error: Option<String>,
    ) -> Self {
        let min = samples.iter().min().copied().unwrap_or_default();
        let max = samples.iter().max().copied().unwrap_or_default();
        let avg = if samples.is_empty() {
            Duration::ZERO
        } else {
            let total: Duration = samples.iter().sum();
            let count = u32::try_from(samples.len()).unwrap_or(u32::MAX);
            total / count
        };
        Self {
            method: name.to_string(),
            iterations: samples.len(),
            min,
            avg,
            max,
            variance_percent: 0.0,
            standard_passed: false,
            advanced_passed: false,
            errors,
            last_error,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} x{}: min {} avg {} max {} ({:+.1}% vs standard), {} errors",
            self.method,
            self.iterations,
            crate::durations::format_duration(self.min),
            crate::durations::format_duration(self.avg),
            crate::durations::format_duration(self.max),
            self.variance_percent,
            self.errors
        )
    }
}

/// Call `callable` `iterations` times, one after another, and keep every
/// sample.
pub async fn measure<F, Fut, T>(
    name: &str,
    iterations: usize,
    mut callable: F,
) -> PerformanceResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CallResult<T>>,
{
    let mut samples = Vec::with_capacity(iterations);
    let mut errors = 0;
    let mut last_error = None;

    for _ in 0..iterations {
        let started = Instant::now();
        let outcome = callable().await;
        samples.push(started.elapsed());
        if let Err(status) = outcome {
            errors += 1;
            last_error = Some(status.to_string());
        }
    }

    tracing::debug!(method = name, iterations, errors, "Measurement complete");
    PerformanceResult::from_samples(name, &samples, errors, last_error)
}

/// Call `callable` back to back until `duration` has passed. Always makes at
/// least one call.
pub async fn measure_for<F, Fut, T>(
    name: &str,
    duration: Duration,
    mut callable: F,
) -> PerformanceResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CallResult<T>>,
{
    let mut samples = Vec::new();
    let mut errors = 0;
    let mut last_error = None;
    let window = Instant::now();

    loop {
        let started = Instant::now();
        let outcome = callable().await;
        samples.push(started.elapsed());
        if let Err(status) = outcome {
            errors += 1;
            last_error = Some(status.to_string());
        }
        if window.elapsed() >= duration {
            break;
        }
    }

    tracing::debug!(method = name, iterations = samples.len(), errors, "Benchmark complete");
    PerformanceResult::from_samples(name, &samples, errors, last_error)
}

/// `(avg - standard) / standard * 100`; zero when there is no standard
/// ceiling.
pub fn variance_percent(avg: Duration, standard: Duration) -> f64 {
    if standard.is_zero() {
        return 0.0;
    }
    let standard = standard.as_secs_f64();
    (avg.as_secs_f64() - standard) / standard * 100.0
}

/// Set the per-level pass flags and the variance on `result`.
pub fn compare_to_baseline(result: &mut PerformanceResult, baseline: &PerformanceBaseline) {
    result.standard_passed =
        baseline.standard_latency.is_zero() || result.avg <= baseline.standard_latency;
    result.advanced_passed =
        baseline.advanced_latency.is_zero() || result.avg <= baseline.advanced_latency;
    result.variance_percent = variance_percent(result.avg, baseline.standard_latency);
}

pub fn within_tolerance(result: &PerformanceResult, tolerance_percent: f64) -> bool {
    result.variance_percent <= tolerance_percent
}
