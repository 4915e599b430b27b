mod matcher;

pub use matcher::{RouteMatchResult, RouteMatcher};
