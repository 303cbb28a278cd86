//! Mock configuration snapshot and builder.

use crate::catalog::PricingCatalog;
use crate::injection::DelaySpec;
use costsource_types::{Method, Status};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Longest identity a mock will answer with.
pub const MAX_NAME_LEN: usize = 64;

/// Upper bound on synthesized data points per range query.
pub const MAX_DATA_POINTS: usize = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockConfigError {
    #[error("plugin name must not be empty")]
    EmptyName,

    #[error("plugin name is {len} characters, limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("delay for {method} has min above max")]
    InvalidDelay { method: Method },

    #[error("currency must be a three-letter code, got {0:?}")]
    InvalidCurrency(String),

    #[error("data point count {requested} exceeds {max}")]
    TooManyDataPoints { requested: usize, max: usize },
}

pub type MockConfigResult<T> = Result<T, MockConfigError>;

/// Everything a [`MockPlugin`](crate::MockPlugin) reads while serving.
///
/// Frozen when the plugin is built. Only error injection can change at
/// runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    pub name: String,
    pub currency: String,
    pub catalog: PricingCatalog,
    pub delays: HashMap<Method, DelaySpec>,
    /// Points per range query. `None` means one per whole hour of the range.
    pub data_points: Option<usize>,
    pub seed: u64,
    /// Source tag stamped on synthesized records.
    pub source_tag: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock-cost-source".to_string(),
            currency: "USD".to_string(),
            catalog: PricingCatalog::standard(),
            delays: HashMap::new(),
            data_points: None,
            seed: 0x5eed,
            source_tag: "mock".to_string(),
        }
    }
}

impl MockConfig {
    pub fn validate(&self) -> MockConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(MockConfigError::EmptyName);
        }
        let len = self.name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(MockConfigError::NameTooLong {
                len,
                max: MAX_NAME_LEN,
            });
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(MockConfigError::InvalidCurrency(self.currency.clone()));
        }
        if let Some(requested) = self.data_points {
            if requested > MAX_DATA_POINTS {
                return Err(MockConfigError::TooManyDataPoints {
                    requested,
                    max: MAX_DATA_POINTS,
                });
            }
        }
        for (method, delay) in &self.delays {
            if !delay.is_valid() {
                return Err(MockConfigError::InvalidDelay { method: *method });
            }
        }
        Ok(())
    }

    pub fn delay_for(&self, method: Method) -> Option<Duration> {
        self.delays.get(&method).map(DelaySpec::sample)
    }
}

/// Builder for [`MockPlugin`](crate::MockPlugin).
#[derive(Debug, Default)]
pub struct MockPluginBuilder {
    config: MockConfig,
    errors: HashMap<Method, Status>,
}

impl MockPluginBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.config.currency = currency.into();
        self
    }

    pub fn catalog(mut self, catalog: PricingCatalog) -> Self {
        self.config.catalog = catalog;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn data_points(mut self, count: usize) -> Self {
        self.config.data_points = Some(count);
        self
    }

    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.source_tag = tag.into();
        self
    }

    pub fn delay(mut self, method: Method, delay: DelaySpec) -> Self {
        self.config.delays.insert(method, delay);
        self
    }

    pub fn fixed_delay(self, method: Method, duration: Duration) -> Self {
        self.delay(method, DelaySpec::fixed(duration))
    }

    /// Start with `method` failing on every call.
    pub fn error(mut self, method: Method, status: Status) -> Self {
        self.errors.insert(method, status);
        self
    }

    pub fn config(mut self, config: MockConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> MockConfigResult<crate::MockPlugin> {
        self.config.validate()?;
        Ok(crate::MockPlugin::from_parts(self.config, self.errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MockConfig::default().validate().is_ok());
    }

    #[test]
    fn name_is_bounded() {
        let config = MockConfig {
            name: "x".repeat(65),
            ..MockConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(MockConfigError::NameTooLong { len: 65, max: 64 })
        );

        let config = MockConfig {
            name: "x".repeat(64),
            ..MockConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_blank_name_and_bad_currency() {
        let blank = MockConfig {
            name: "  ".into(),
            ..MockConfig::default()
        };
        assert_eq!(blank.validate(), Err(MockConfigError::EmptyName));

        let currency = MockConfig {
            currency: "usd".into(),
            ..MockConfig::default()
        };
        assert!(matches!(
            currency.validate(),
            Err(MockConfigError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn rejects_inverted_delay_range() {
        let err = MockPluginBuilder::default()
            .delay(
                Method::Supports,
                DelaySpec::range(Duration::from_secs(2), Duration::from_secs(1)),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            MockConfigError::InvalidDelay {
                method: Method::Supports
            }
        );
    }
}
