use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use super::{BalancerError, LoadBalancer, RequestContext};
use crate::config::{Cluster, Destination};

/// Round-robin selection with one atomic counter per cluster, created
/// lazily on first selection. Counters live for the lifetime of the
/// balancer instance (process-wide), independent of any single config
/// snapshot.
///
/// A signed counter is used deliberately: on overflow it wraps into
/// negative territory, and the modulo is rewrapped into `[0, N)` rather
/// than propagating a negative index.
pub struct RoundRobinBalancer {
    counters: DashMap<String, AtomicI64>,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn pick<'a>(
        &self,
        cluster: &'a Cluster,
        _ctx: &RequestContext<'_>,
    ) -> Result<&'a Destination, BalancerError> {
        let len = cluster.destinations.len();
        if len == 0 {
            return Err(BalancerError::EmptyCluster(cluster.id.clone()));
        }

        let counter = self
            .counters
            .entry(cluster.id.to_ascii_lowercase())
            .or_insert_with(|| AtomicI64::new(0));
        let raw = counter.fetch_add(1, Ordering::Relaxed);

        let mut idx = raw % len as i64;
        if idx < 0 {
            idx += len as i64;
        }

        Ok(&cluster.destinations[idx as usize])
    }
}
