//! Cost-source plugin contract.
//!
//! Plain Rust messages, status codes and the [`CostSource`] trait. Nothing
//! here knows about transport; the harness crate carries these values over
//! in-memory channels.

#![deny(unsafe_code)]

pub mod messages;
pub mod method;
pub mod service;
pub mod status;

pub use messages::*;
pub use method::{Method, UnknownMethod};
pub use service::{CostSource, UnimplementedCostSource};
pub use status::{CallResult, Code, Status};
