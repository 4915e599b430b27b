//! gRPC-over-HTTP/2 detection helpers. The proxy never parses protobuf
//! frames or the gRPC wire format itself — it only needs to recognize a
//! gRPC request well enough to apply the version-forcing and prefix
//! fallback rules from the dispatcher.

use hyper::header::CONTENT_TYPE;
use hyper::{Request, Version};

const GRPC_CONTENT_TYPE: &str = "application/grpc";

/// True when the request declares itself gRPC (`Content-Type:
/// application/grpc*`) and arrived over HTTP/2, which is the only
/// transport gRPC is ever carried over in this proxy.
pub fn is_grpc_request<B>(req: &Request<B>) -> bool {
    req.version() >= Version::HTTP_2 && has_grpc_content_type(req)
}

pub fn has_grpc_content_type<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with(GRPC_CONTENT_TYPE))
        .unwrap_or(false)
}
