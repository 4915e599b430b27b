//! Translates an inbound server request into an outbound client request,
//! streams it to the selected destination, and relays the response back —
//! the core of the proxy. Grounded in the teacher's
//! `proxy/handler.rs::build_proxied_request` / response relay, generalized
//! to explicit per-route HTTP-version selection and the hop-by-hop set
//! this proxy is specified against.

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::header::{
    HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST, KEEP_ALIVE, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, TRAILER, TRANSFER_ENCODING, UPGRADE,
};
use hyper::{HeaderMap, Method, Request, Response, Uri, Version};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, error};

use crate::config::{Destination, RouteKind};
use crate::router::RouteMatchResult;

use super::error::ProxyError;
use super::h2c::H2cPool;
use super::responses::full_body;

/// Body type used for both inbound and outbound requests/responses.
/// `hyper::Error` covers both sides: `Incoming` (server request bodies and
/// client response bodies) already reports errors this way.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

const PROXY_CONNECTION: &str = "proxy-connection";

/// Exact, case-insensitive hop-by-hop header set stripped in both
/// directions.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == CONNECTION
        || name == KEEP_ALIVE
        || name == TRANSFER_ENCODING
        || name == UPGRADE
        || name == PROXY_AUTHENTICATE
        || name == PROXY_AUTHORIZATION
        || name == TRAILER
        || name == HOST
        || name.as_str().eq_ignore_ascii_case(PROXY_CONNECTION)
}

pub struct Forwarder {
    client: Client<HttpsConnector<HttpConnector>, ProxyBody>,
    h2c: H2cPool,
}

impl Forwarder {
    pub fn new() -> Self {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        // Default version HTTP/2 with downgrade allowed (set per-request
        // below), no redirects, no cookie jar, no decompression — this is
        // the legacy client's whole default behavior, so nothing further
        // to configure there. No request timeout: this is a streaming
        // proxy and cancellation is driven by the inbound signal, not a
        // deadline.
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build(connector);

        Self {
            client,
            h2c: H2cPool::new(),
        }
    }

    pub async fn forward(
        &self,
        req: Request<Incoming>,
        matched: &RouteMatchResult<'_>,
        destination: &Destination,
    ) -> Response<ProxyBody> {
        let started = std::time::Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let route_prefix = matched.route.prefix.clone();
        let destination_id = destination.id.clone();

        let inbound_version = req.version();
        let query = req.uri().query().map(str::to_string);

        let target = match build_target_uri(destination, &matched.downstream_path, query.as_deref())
        {
            Ok(uri) => uri,
            Err(e) => {
                error!(%method, %path, route = %route_prefix, destination = %destination_id, "failed to build upstream URL: {e}");
                return ProxyError::UpstreamPreResponse(e).into_response();
            }
        };

        let (version, force_h2c) =
            choose_version(matched.route.kind, inbound_version, &target);

        let outbound = match build_outbound_request(req, target, version) {
            Ok(r) => r,
            Err(e) => {
                error!(%method, %path, route = %route_prefix, destination = %destination_id, "failed to build outbound request: {e}");
                return ProxyError::UpstreamPreResponse(e).into_response();
            }
        };

        let result = if force_h2c {
            let authority = outbound
                .uri()
                .authority()
                .map(|a| a.as_str().to_string())
                .unwrap_or_default();
            self.h2c.send(&authority, outbound).await.map_err(|e| e.to_string())
        } else {
            self.client.request(outbound).await.map_err(|e| e.to_string())
        };

        match result {
            Ok(response) => {
                let proxied = relay_response(response);
                debug!(
                    %method,
                    %path,
                    route = %route_prefix,
                    destination = %destination_id,
                    status = proxied.status().as_u16(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "proxied request"
                );
                proxied
            }
            Err(e) => {
                error!(%method, %path, route = %route_prefix, destination = %destination_id, "upstream request failed: {e}");
                ProxyError::UpstreamPreResponse(e).into_response()
            }
        }
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

/// Combine the destination base URL with the downstream path and the
/// inbound query string. Base path is treated as ending in `/`; a leading
/// `/` on the remainder is stripped before concatenation so the two don't
/// double up.
fn build_target_uri(
    destination: &Destination,
    downstream_path: &str,
    inbound_query: Option<&str>,
) -> Result<Uri, String> {
    let base = &destination.base_url;
    let host = base.host_str().ok_or("destination URL has no host")?;
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut base_path = base.path().to_string();
    if !base_path.ends_with('/') {
        base_path.push('/');
    }
    let path = format!("{base_path}{}", downstream_path.trim_start_matches('/'));

    let query = match (base.query(), inbound_query) {
        (Some(bq), Some(iq)) if !bq.is_empty() && !iq.is_empty() => format!("{bq}&{iq}"),
        (Some(bq), _) if !bq.is_empty() => bq.to_string(),
        (_, Some(iq)) if !iq.is_empty() => iq.to_string(),
        _ => String::new(),
    };

    let uri_string = if query.is_empty() {
        format!("{}://{authority}{path}", base.scheme())
    } else {
        format!("{}://{authority}{path}?{query}", base.scheme())
    };

    uri_string.parse().map_err(|e: hyper::http::uri::InvalidUri| e.to_string())
}

/// gRPC forces HTTP/2 outright (plaintext destinations need prior
/// knowledge since h2c has no ALPN to negotiate with). HTTP routes mirror
/// the inbound version but never force an upgrade past HTTP/2, and allow
/// the destination to be served over HTTP/1.1 if that's all it speaks.
fn choose_version(kind: RouteKind, inbound_version: Version, target: &Uri) -> (Version, bool) {
    match kind {
        RouteKind::Grpc => {
            let force_h2c = target.scheme_str() == Some("http");
            (Version::HTTP_2, force_h2c)
        }
        RouteKind::Http => {
            let version = if inbound_version >= Version::HTTP_2 {
                Version::HTTP_2
            } else {
                Version::HTTP_11
            };
            (version, false)
        }
    }
}

fn build_outbound_request(
    req: Request<Incoming>,
    target: Uri,
    version: Version,
) -> Result<Request<ProxyBody>, String> {
    let (mut parts, body) = req.into_parts();
    let carries_body = request_carries_body(&parts.headers, &parts.method);

    parts.uri = target.clone();
    parts.version = version;
    parts.headers.retain(|name, _| !is_hop_by_hop(name));

    if let Some(authority) = target.authority() {
        let value = HeaderValue::from_str(authority.as_str()).map_err(|e| e.to_string())?;
        parts.headers.insert(HOST, value);
    }

    let body: ProxyBody = if carries_body {
        body.boxed()
    } else {
        empty_body()
    };

    Ok(Request::from_parts(parts, body))
}

/// A body is attached iff the inbound request declares one: a positive
/// `Content-Length`, a `Transfer-Encoding` header, or a method that
/// conventionally carries a body. Everything else forwards bodiless.
fn request_carries_body(headers: &HeaderMap, method: &Method) -> bool {
    let positive_content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|n| n > 0);

    positive_content_length
        || headers.contains_key(TRANSFER_ENCODING)
        || matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Copy status, headers (minus hop-by-hop) and stream the body as-is.
/// Trailers ride inside the same body stream `Incoming` already exposes —
/// hyper's h2 codec writes them out as real HTTP/2 trailers once the data
/// frames are exhausted, so there is nothing extra to orchestrate here.
fn relay_response(response: Response<Incoming>) -> Response<ProxyBody> {
    let (mut parts, body) = response.into_parts();
    parts.headers.retain(|name, _| !is_hop_by_hop(name));
    Response::from_parts(parts, body.boxed())
}

fn empty_body() -> ProxyBody {
    Empty::new()
        .map_err(|never: Infallible| match never {})
        .boxed()
}
