use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use switchboard::balancer::RoundRobinBalancer;
use switchboard::config;
use switchboard::server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (proxy_config, listen) = match config::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    info!(port = listen.port, tls = listen.enable_tls, "starting switchboard");

    let server = Server::new(proxy_config, listen, Box::new(RoundRobinBalancer::new()));
    server.run().await
}
