mod round_robin;

pub use round_robin::RoundRobinBalancer;

use hyper::{HeaderMap, Method};
use thiserror::Error;

use crate::config::{Cluster, Destination};

#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("cluster '{0}' has no destinations")]
    EmptyCluster(String),
}

/// Everything a balancing strategy is allowed to look at about the request
/// it's choosing a destination for. The sole shipped strategy
/// ([`RoundRobinBalancer`]) ignores this entirely; it exists so a future
/// strategy (sticky-by-header, say) doesn't need a trait change.
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
}

/// Picks one destination from a cluster per call.
pub trait LoadBalancer: Send + Sync {
    fn pick<'a>(
        &self,
        cluster: &'a Cluster,
        ctx: &RequestContext<'_>,
    ) -> Result<&'a Destination, BalancerError>;
}
