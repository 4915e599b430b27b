//! Binds one TCP listener and drives each accepted connection through the
//! auto HTTP/1.1-or-HTTP/2 builder, handing every request to the shared
//! [`Dispatcher`]. Grounded in the teacher's `server/listener.rs`, trimmed
//! to a single entrypoint (this proxy listens on one port); the
//! draining-on-shutdown behavior the teacher's accept loop gates through
//! `state.connections` is kept, implemented with a per-connection
//! `mpsc::Sender` guard instead since this crate has no standalone
//! connection-tracker type.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_rustls::TlsAcceptor as TokioTlsAcceptor;
use tracing::{debug, error, info};

use crate::proxy::Dispatcher;
use crate::tls::TlsAcceptor;

pub struct Listener {
    port: u16,
    dispatcher: Arc<Dispatcher>,
    tls_acceptor: Option<TokioTlsAcceptor>,
}

impl Listener {
    pub fn new(port: u16, dispatcher: Arc<Dispatcher>, tls_acceptor: Option<TlsAcceptor>) -> Self {
        Self {
            port,
            dispatcher,
            tls_acceptor: tls_acceptor.map(|a| TokioTlsAcceptor::from(a.get_config())),
        }
    }

    /// Accept connections until `shutdown` fires, then stop accepting and
    /// wait for every in-flight connection to finish before returning.
    ///
    /// Draining works by handing each spawned connection task a clone of
    /// `drain_tx`; once the accept loop exits, the loop's own clone is
    /// dropped, so `drain_rx.recv()` only resolves once every connection
    /// task has dropped its clone too.
    pub async fn serve(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;

        let protocol = if self.tls_acceptor.is_some() { "https" } else { "http" };
        info!("listening on {addr} ({protocol})");

        let (drain_tx, mut drain_rx) = mpsc::channel::<()>(1);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("no longer accepting new connections on {addr}");
                        break;
                    }
                }
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("failed to accept connection: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&self.dispatcher);
                    let tls_acceptor = self.tls_acceptor.clone();
                    let drain_guard = drain_tx.clone();

                    tokio::spawn(async move {
                        if let Some(acceptor) = tls_acceptor {
                            match acceptor.accept(stream).await {
                                Ok(tls_stream) => {
                                    let io = TokioIo::new(tls_stream);
                                    Self::serve_connection(io, remote_addr, dispatcher).await;
                                }
                                Err(e) => debug!("TLS handshake failed from {remote_addr}: {e}"),
                            }
                        } else {
                            let io = TokioIo::new(stream);
                            Self::serve_connection(io, remote_addr, dispatcher).await;
                        }
                        drop(drain_guard);
                    });
                }
            }
        }

        drop(drain_tx);
        drain_rx.recv().await;
        info!("all connections on {addr} drained");

        Ok(())
    }

    async fn serve_connection<I>(io: I, remote_addr: SocketAddr, dispatcher: Arc<Dispatcher>)
    where
        I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let service = service_fn(move |req| {
            let dispatcher = Arc::clone(&dispatcher);
            async move { Ok::<_, std::convert::Infallible>(dispatcher.dispatch(req).await) }
        });

        let builder = AutoBuilder::new(TokioExecutor::new());
        if let Err(e) = builder.serve_connection_with_upgrades(io, service).await {
            debug!("connection error from {remote_addr}: {e}");
        }
    }
}
