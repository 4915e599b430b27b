mod listener;

pub use listener::Listener;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use crate::balancer::LoadBalancer;
use crate::config::{ListenConfig, ProxyConfig, StaticConfigProvider};
use crate::proxy::Dispatcher;
use crate::tls::TlsAcceptor;

pub struct Server {
    listen: ListenConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: ProxyConfig, listen: ListenConfig, balancer: Box<dyn LoadBalancer>) -> Self {
        let provider = Arc::new(StaticConfigProvider::new(config));
        Self {
            listen,
            dispatcher: Arc::new(Dispatcher::new(provider, balancer)),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let tls_acceptor = TlsAcceptor::from_listen_config(&self.listen)?;
        let listener = Listener::new(self.listen.port, Arc::clone(&self.dispatcher), tls_acceptor);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            if let Err(e) = listener.serve(shutdown_rx).await {
                tracing::error!("listener error: {e}");
            }
        });

        info!("proxy started, waiting for shutdown signal");
        shutdown_signal().await;
        info!("shutdown signal received, draining in-flight requests");

        let _ = shutdown_tx.send(true);
        if let Err(e) = handle.await {
            tracing::error!("listener task panicked while draining: {e}");
        }
        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
