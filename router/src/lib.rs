//! Host- and pattern-based HTTP request router.
//!
//! Rules are declared up front and compiled into per-host radix tries;
//! requests are then classified by host, path, method, headers, and query
//! parameters. Building mutates, matching only reads, so a built router
//! serves concurrent lookups without coordination.

pub mod config;
pub mod error;
pub mod routing;

pub use config::{KeyMatcher, PathConfig, RouterConfig, RuleConfig};
pub use error::RouterError;
pub use routing::{
    CompiledRoute, MethodMask, QueryParams, RouteMatch, RouteRequest, Router, SharedRouter,
};
