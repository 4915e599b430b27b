//! Maps the error kinds from the error-handling design onto the exact
//! status code and body text each one gets on the wire. Kept next to the
//! dispatcher since it's the only place an error becomes a response —
//! the forwarder and balancer return data, not rendered responses.

use hyper::StatusCode;
use thiserror::Error;

use super::forwarder::ProxyBody;
use super::responses::text_response;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no matching route")]
    NoRouteMatched,
    #[error("cluster '{0}' is unavailable")]
    ClusterUnavailable(String),
    #[error("upstream request failed before a response was received: {0}")]
    UpstreamPreResponse(String),
}

impl ProxyError {
    pub fn into_response(self) -> hyper::Response<ProxyBody> {
        match self {
            ProxyError::NoRouteMatched => {
                text_response(StatusCode::NOT_FOUND, "No matching route")
            }
            ProxyError::ClusterUnavailable(_) => {
                text_response(StatusCode::BAD_GATEWAY, "Cluster unavailable")
            }
            ProxyError::UpstreamPreResponse(_) => {
                text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_route_matched_is_404() {
        let resp = ProxyError::NoRouteMatched.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cluster_unavailable_is_502() {
        let resp = ProxyError::ClusterUnavailable("api".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn upstream_pre_response_is_502() {
        let resp = ProxyError::UpstreamPreResponse("connect failed".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
