//! In-process transport for cost-source plugins.
//!
//! Stands up a server bound to one [`costsource_types::CostSource`] and a
//! matching [`PluginClient`] over in-memory channels. No OS socket is
//! involved and no state is shared between harness instances.
//!
//! ```rust,ignore
//! let mut harness = InProcessHarness::new(Arc::new(plugin));
//! let client = harness.start().await?;
//! let name = client.name().await?;
//! harness.stop().await;
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod frame;
pub mod harness;
mod listener;
mod server;

pub use client::PluginClient;
pub use error::{HarnessError, HarnessResult};
pub use frame::{Request, Response};
pub use harness::{HarnessBuilder, HarnessConfig, InProcessHarness};
pub use listener::ConnectionId;
