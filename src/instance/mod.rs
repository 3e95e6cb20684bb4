//! The persistent instance layer.
//!
//! Cooked values, the focus-based zipper over instance trees, and instance
//! routes (instance-identifier and api-path addressing). Values are
//! immutable and shared; every edit path-copies one ancestor chain.

mod error;
pub mod route;
mod value;
mod zipper;

pub use error::{RawError, ZipperError};
pub use route::{parse_instance_id, InstanceRoute, RouteStep};
pub use value::{ArrayValue, Decimal64, ObjectValue, Value};
pub use zipper::Focus;
