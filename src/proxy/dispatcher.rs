//! Top-level request entry point: health checks, route matching, cluster
//! resolution, destination selection, and handing off to the
//! [`Forwarder`]. Grounded in the teacher's `proxy/handler.rs::handle`,
//! restructured around the route-table model this proxy uses instead of
//! the teacher's rule DSL.

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use tracing::warn;

use crate::balancer::{LoadBalancer, RequestContext};
use crate::config::{ConfigProvider, ProxyConfig};
use crate::router::RouteMatcher;

use super::error::ProxyError;
use super::forwarder::{Forwarder, ProxyBody};
use super::grpc::is_grpc_request;
use super::responses::json_response;

const LIVE_PATH: &str = "/health/live";
const READY_PATH: &str = "/health/ready";

pub struct Dispatcher {
    config: Arc<dyn ConfigProvider>,
    balancer: Box<dyn LoadBalancer>,
    forwarder: Forwarder,
}

impl Dispatcher {
    pub fn new(config: Arc<dyn ConfigProvider>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            config,
            balancer,
            forwarder: Forwarder::new(),
        }
    }

    pub async fn dispatch(&self, req: Request<Incoming>) -> Response<ProxyBody> {
        if req.method() == Method::GET {
            match req.uri().path() {
                LIVE_PATH => return json_response(StatusCode::OK, json!({ "status": "live" })),
                READY_PATH => return json_response(StatusCode::OK, json!({ "status": "ready" })),
                _ => {}
            }
        }

        let config = self.config.current();
        let matcher = RouteMatcher::new(&config.routes);
        let path = req.uri().path().to_string();

        let matched = if is_grpc_request(&req) && !path_has_grpc_prefix(&config, &path) {
            matcher.match_grpc_fallback(&path).or_else(|| matcher.match_path(&path))
        } else {
            matcher.match_path(&path)
        };

        let Some(matched) = matched else {
            return ProxyError::NoRouteMatched.into_response();
        };

        let Some(cluster) = config.cluster(&matched.route.cluster) else {
            warn!(cluster = %matched.route.cluster, "route references a cluster missing at dispatch time");
            return ProxyError::ClusterUnavailable(matched.route.cluster.clone()).into_response();
        };

        let ctx = RequestContext {
            method: req.method(),
            headers: req.headers(),
        };

        let destination = match self.balancer.pick(cluster, &ctx) {
            Ok(d) => d,
            Err(e) => {
                warn!("{e}");
                return ProxyError::ClusterUnavailable(cluster.id.clone()).into_response();
            }
        };

        self.forwarder.forward(req, &matched, destination).await
    }
}

/// True when `path` already falls under the dedicated gRPC route's prefix,
/// meaning ordinary prefix matching already covers it and the fallback
/// (which ignores prefixes and trusts the content type) shouldn't kick in.
fn path_has_grpc_prefix(config: &ProxyConfig, path: &str) -> bool {
    match config.grpc_route() {
        Some(route) => RouteMatcher::new(std::slice::from_ref(route))
            .match_path(path)
            .is_some(),
        None => false,
    }
}
