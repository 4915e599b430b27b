use std::collections::HashMap;

use thiserror::Error;
use url::Url;

/// One concrete backend behind a [`Cluster`].
///
/// Immutable once built; lives as long as the [`ProxyConfig`] snapshot that
/// owns it.
#[derive(Debug, Clone)]
pub struct Destination {
    pub id: String,
    pub base_url: Url,
}

impl Destination {
    pub fn new(id: impl Into<String>, base_url: Url) -> Self {
        Self {
            id: id.into(),
            base_url,
        }
    }
}

/// A named, ordered group of equivalent backends. Order defines the
/// round-robin rotation order.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: String,
    pub destinations: Vec<Destination>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, destinations: Vec<Destination>) -> Self {
        Self {
            id: id.into(),
            destinations,
        }
    }
}

/// The protocol a route forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Http,
    Grpc,
}

/// A path-prefix-to-cluster binding.
///
/// `prefix` is normalized at construction time: it always starts with `/`,
/// and (unless it is exactly `/`) never ends with `/`.
#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: String,
    pub cluster: String,
    pub kind: RouteKind,
    pub strip_prefix: bool,
}

impl Route {
    pub fn new(
        prefix: impl AsRef<str>,
        cluster: impl Into<String>,
        kind: RouteKind,
        strip_prefix: bool,
    ) -> Self {
        Self {
            prefix: normalize_prefix(prefix.as_ref()),
            cluster: cluster.into(),
            kind,
            strip_prefix,
        }
    }
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    };
    while prefix.len() > 1 && prefix.ends_with('/') {
        prefix.pop();
    }
    prefix
}

/// Immutable snapshot of the routing configuration: an ordered route table
/// plus the cluster map routes resolve against.
///
/// Cluster identifiers are matched case-insensitively; the map is keyed by
/// the lowercased id.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub routes: Vec<Route>,
    clusters: HashMap<String, Cluster>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("route prefix '{prefix}' references unknown cluster '{cluster}'")]
    UnknownCluster { prefix: String, cluster: String },
    #[error("duplicate cluster id '{0}'")]
    DuplicateCluster(String),
}

impl ProxyConfig {
    pub fn new(routes: Vec<Route>, clusters: Vec<Cluster>) -> Result<Self, ConfigError> {
        let mut map = HashMap::with_capacity(clusters.len());
        for cluster in clusters {
            let key = cluster.id.to_ascii_lowercase();
            if map.contains_key(&key) {
                return Err(ConfigError::DuplicateCluster(cluster.id));
            }
            map.insert(key, cluster);
        }
        let config = Self {
            routes,
            clusters: map,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the invariants from the data model: every route's cluster
    /// resolves, and no two clusters share an id (already enforced in
    /// `new`; this additionally checks route resolution).
    ///
    /// An empty cluster is deliberately *not* a validation failure here —
    /// the forwarder surfaces that as a 502 at request time so externally
    /// mutated configs aren't refused at boot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for route in &self.routes {
            let key = route.cluster.to_ascii_lowercase();
            if !self.clusters.contains_key(&key) {
                return Err(ConfigError::UnknownCluster {
                    prefix: route.prefix.clone(),
                    cluster: route.cluster.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn cluster(&self, id: &str) -> Option<&Cluster> {
        self.clusters.get(&id.to_ascii_lowercase())
    }

    pub fn grpc_route(&self) -> Option<&Route> {
        self.routes.iter().find(|r| r.kind == RouteKind::Grpc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn normalizes_trailing_slash() {
        let r = Route::new("/api/", "api", RouteKind::Http, false);
        assert_eq!(r.prefix, "/api");
    }

    #[test]
    fn normalizes_missing_leading_slash() {
        let r = Route::new("api", "api", RouteKind::Http, false);
        assert_eq!(r.prefix, "/api");
    }

    #[test]
    fn root_prefix_stays_single_slash() {
        let r = Route::new("/", "api", RouteKind::Http, false);
        assert_eq!(r.prefix, "/");
    }

    #[test]
    fn rejects_route_to_unknown_cluster() {
        let routes = vec![Route::new("/api", "api", RouteKind::Http, false)];
        let err = ProxyConfig::new(routes, vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCluster { .. }));
    }

    #[test]
    fn accepts_empty_cluster_at_boot() {
        let routes = vec![Route::new("/api", "api", RouteKind::Http, false)];
        let clusters = vec![Cluster::new("api", vec![])];
        assert!(ProxyConfig::new(routes, clusters).is_ok());
    }

    #[test]
    fn rejects_duplicate_cluster_ids() {
        let clusters = vec![
            Cluster::new("api", vec![Destination::new("d0", url("http://a/"))]),
            Cluster::new("API", vec![Destination::new("d1", url("http://b/"))]),
        ];
        let err = ProxyConfig::new(vec![], clusters).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCluster(_)));
    }

    #[test]
    fn cluster_lookup_is_case_insensitive() {
        let clusters = vec![Cluster::new(
            "Api",
            vec![Destination::new("d0", url("http://localhost:7001/"))],
        )];
        let config = ProxyConfig::new(vec![], clusters).unwrap();
        assert!(config.cluster("api").is_some());
        assert!(config.cluster("API").is_some());
    }
}
