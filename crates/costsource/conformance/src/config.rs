//! Suite configuration

use crate::error::{SuiteError, SuiteResult};
use crate::level::ConformanceLevel;
use costsource_types::ResourceDescriptor;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one conformance run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Level to certify against
    #[serde(default)]
    pub target_level: ConformanceLevel,

    /// Timeout for each test, in milliseconds
    #[serde(default = "default_test_timeout")]
    pub test_timeout_ms: u64,

    /// Fan-out width for concurrency tests
    #[serde(default = "default_parallel_requests")]
    pub parallel_requests: usize,

    /// Run time-boxed throughput benchmarks
    #[serde(default)]
    pub enable_benchmarks: bool,

    /// Length of each benchmark, in milliseconds
    #[serde(default = "default_benchmark_duration")]
    pub benchmark_duration_ms: u64,

    /// Wall-clock bound on the whole run, in seconds
    #[serde(default)]
    pub suite_timeout_secs: Option<u64>,

    /// Name reported when the plugin cannot be asked for one
    #[serde(default)]
    pub plugin_label: Option<String>,

    /// Resource the tests query
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            target_level: ConformanceLevel::Basic,
            test_timeout_ms: default_test_timeout(),
            parallel_requests: default_parallel_requests(),
            enable_benchmarks: false,
            benchmark_duration_ms: default_benchmark_duration(),
            suite_timeout_secs: None,
            plugin_label: None,
            probe: ProbeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// The resource every test asks the plugin about.
///
/// A plugin that only prices one provider points this at something it knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(default)]
    pub sku: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Id used for actual-cost queries
    #[serde(default = "default_resource_id")]
    pub resource_id: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            resource_type: default_resource_type(),
            sku: "t3.micro".to_string(),
            region: default_region(),
            resource_id: default_resource_id(),
        }
    }
}

impl ProbeConfig {
    pub fn resource(&self) -> ResourceDescriptor {
        ResourceDescriptor::new(&self.provider, &self.resource_type)
            .with_sku(&self.sku)
            .with_region(&self.region)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_test_timeout() -> u64 {
    30_000
}

fn default_parallel_requests() -> usize {
    10
}

fn default_benchmark_duration() -> u64 {
    1_000
}

fn default_provider() -> String {
    "aws".to_string()
}

fn default_resource_type() -> String {
    "ec2".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_resource_id() -> String {
    "i-conformance-probe".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SuiteConfig {
    /// Defaults targeting `level`.
    pub fn for_level(level: ConformanceLevel) -> Self {
        Self {
            target_level: level,
            ..Default::default()
        }
    }

    /// Load configuration: defaults, then the optional file, then
    /// `CONFORMANCE_*` environment variables (`CONFORMANCE_LOGGING__LEVEL`
    /// for nested keys).
    pub fn load(path: Option<&str>) -> SuiteResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&SuiteConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CONFORMANCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: SuiteConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SuiteResult<()> {
        if self.test_timeout_ms == 0 {
            return Err(SuiteError::Config("test_timeout_ms must be positive".into()));
        }
        if self.parallel_requests == 0 {
            return Err(SuiteError::Config(
                "parallel_requests must be at least 1".into(),
            ));
        }
        if self.enable_benchmarks && self.benchmark_duration_ms == 0 {
            return Err(SuiteError::Config(
                "benchmark_duration_ms must be positive when benchmarks are enabled".into(),
            ));
        }
        if self.suite_timeout_secs == Some(0) {
            return Err(SuiteError::Config("suite_timeout_secs must be positive".into()));
        }
        if self.probe.provider.is_empty() || self.probe.resource_type.is_empty() {
            return Err(SuiteError::Config(
                "probe provider and resource type are required".into(),
            ));
        }
        Ok(())
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    pub fn benchmark_duration(&self) -> Duration {
        Duration::from_millis(self.benchmark_duration_ms)
    }

    pub fn suite_timeout(&self) -> Option<Duration> {
        self.suite_timeout_secs.map(Duration::from_secs)
    }

    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_parallel_requests(mut self, width: usize) -> Self {
        self.parallel_requests = width;
        self
    }

    pub fn with_benchmarks(mut self, duration: Duration) -> Self {
        self.enable_benchmarks = true;
        self.benchmark_duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_suite_timeout(mut self, timeout: Duration) -> Self {
        self.suite_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SuiteConfig::default();
        assert_eq!(config.target_level, ConformanceLevel::Basic);
        assert_eq!(config.test_timeout(), Duration::from_secs(30));
        assert_eq!(config.parallel_requests, 10);
        assert!(!config.enable_benchmarks);
        assert!(config.suite_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SuiteConfig =
            serde_json::from_str(r#"{"target_level":"advanced","parallel_requests":4}"#).unwrap();
        assert_eq!(config.target_level, ConformanceLevel::Advanced);
        assert_eq!(config.parallel_requests, 4);
        assert_eq!(config.test_timeout_ms, 30_000);
        assert_eq!(config.probe.provider, "aws");
    }

    #[test]
    fn test_load_without_file() {
        let config = SuiteConfig::load(None).unwrap();
        assert_eq!(config.parallel_requests, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_rejects_zero_width() {
        let config = SuiteConfig::default().with_parallel_requests(0);
        assert!(matches!(config.validate(), Err(SuiteError::Config(_))));
    }

    #[test]
    fn test_probe_resource() {
        let resource = ProbeConfig::default().resource();
        assert_eq!(resource.to_string(), "aws/ec2:t3.micro@us-east-1");
    }
}
