mod matcher;
mod method;
mod radix_tree;

pub use matcher::{QueryParams, RouteMatch, RouteRequest, Router, SharedRouter};
pub use method::MethodMask;
pub use radix_tree::CompiledRoute;
