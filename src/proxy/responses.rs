//! Small helpers for responses the dispatcher/forwarder build themselves
//! rather than relay from a backend (health checks, 404/502 bodies).

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};

use super::forwarder::ProxyBody;

pub fn full_body(content: impl Into<Bytes>) -> ProxyBody {
    Full::new(content.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

pub fn text_response(status: StatusCode, message: &'static str) -> Response<ProxyBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(full_body(message))
        .unwrap()
}

pub fn json_response(status: StatusCode, body: serde_json::Value) -> Response<ProxyBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(body.to_string()))
        .unwrap()
}
