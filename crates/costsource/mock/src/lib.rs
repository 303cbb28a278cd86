//! Mock cost-source plugin.
//!
//! A configurable [`CostSource`](costsource_types::CostSource) used as a
//! fixture and as the self-test target of the conformance suite. Prices come
//! from a small provider catalog with deterministic per-resource variation;
//! any operation can be slowed down or forced to fail.
//!
//! ```ignore
//! let plugin = MockPlugin::builder()
//!     .name("fixture")
//!     .data_points(1000)
//!     .fixed_delay(Method::GetActualCost, Duration::from_millis(20))
//!     .build()?;
//! plugin.inject_error(Method::Supports, Status::unavailable("maintenance"));
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod injection;
pub mod plugin;
pub mod variation;

pub use catalog::{PricingCatalog, PricingEntry, ResourceClass};
pub use config::{MockConfig, MockConfigError, MockConfigResult, MockPluginBuilder};
pub use injection::DelaySpec;
pub use plugin::MockPlugin;
