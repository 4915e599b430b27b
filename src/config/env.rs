//! Builds a [`ProxyConfig`] from the environment, applying the documented
//! defaults wherever a variable is absent or empty. Grounded in the
//! teacher's `Config::load` (`config/mod.rs`): parse, then `validate()`
//! before the process starts serving.

use anyhow::{bail, Context, Result};
use url::Url;

use super::types::{Cluster, Destination, ProxyConfig, Route, RouteKind};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_HTTP_BACKEND: &str = "http://localhost:7001";
const DEFAULT_GRPC_BACKENDS: &str = "http://localhost:7002;http://localhost:7003";

/// Everything the listener needs beyond the route/cluster table.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub port: u16,
    pub enable_tls: bool,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_destinations(prefix: &str, urls: &str) -> Result<Vec<Destination>> {
    urls.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, raw)| {
            let base_url = Url::parse(raw)
                .with_context(|| format!("invalid destination URL '{raw}'"))?;
            Ok(Destination::new(format!("{prefix}-{i}"), base_url))
        })
        .collect()
}

/// Load the proxy's route table, cluster map and listener settings from
/// `PROXY_*` environment variables. Returns an error (never panics) on
/// malformed input, matching the "configuration error at startup" row of
/// the error-handling design.
pub fn load() -> Result<(ProxyConfig, ListenConfig)> {
    let port = match env_var("PROXY_PORT") {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("PROXY_PORT '{raw}' is not a valid port"))?,
        None => DEFAULT_PORT,
    };

    let enable_tls = match env_var("PROXY_ENABLE_TLS") {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => bail!("PROXY_ENABLE_TLS '{other}' is not a valid boolean"),
        },
        None => true,
    };

    let http_backend = env_var("PROXY_HTTP_BACKEND").unwrap_or_else(|| DEFAULT_HTTP_BACKEND.into());
    let grpc_backends =
        env_var("PROXY_GRPC_BACKENDS").unwrap_or_else(|| DEFAULT_GRPC_BACKENDS.into());

    let http_destinations = parse_destinations("api", &http_backend)?;
    if http_destinations.is_empty() {
        bail!("PROXY_HTTP_BACKEND resolved to no destinations");
    }
    let grpc_destinations = parse_destinations("grpc", &grpc_backends)?;
    if grpc_destinations.is_empty() {
        bail!("PROXY_GRPC_BACKENDS resolved to no destinations");
    }

    let clusters = vec![
        Cluster::new("api", http_destinations),
        Cluster::new("grpc", grpc_destinations),
    ];

    let routes = vec![
        Route::new("/api/", "api", RouteKind::Http, false),
        Route::new("/grpc/", "grpc", RouteKind::Grpc, true),
    ];

    let proxy_config =
        ProxyConfig::new(routes, clusters).context("invalid proxy configuration")?;

    let listen = ListenConfig {
        port,
        enable_tls,
        tls_cert_path: env_var("PROXY_TLS_CERT"),
        tls_key_path: env_var("PROXY_TLS_KEY"),
    };

    Ok((proxy_config, listen))
}
