//! Route Processor: the per-route pipeline that turns detector emissions
//! into archived outcomes. See `SPEC_FULL.md` §5.9.

pub mod error;
pub mod processor;

pub use error::{RouteError, RouteResult};
pub use processor::RouteProcessor;
