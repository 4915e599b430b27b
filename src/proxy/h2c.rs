//! Prior-knowledge plaintext HTTP/2 connections to gRPC destinations.
//!
//! gRPC requires HTTP/2, but a plaintext (`http://`) destination can't
//! negotiate h2 via ALPN the way a TLS connection can — the client has to
//! assume h2 up front ("prior knowledge") and skip the HTTP/1.1 handshake
//! entirely. This is the one place the forwarder needs a connection
//! strategy distinct from the general pooled client, which is why it's
//! kept separate rather than folded into `Forwarder`.
//!
//! Grounded in the teacher's `proxy/http2_client.rs` connection pool,
//! narrowed to what gRPC forcing actually needs.

use std::sync::Arc;

use dashmap::DashMap;
use hyper::client::conn::http2::SendRequest;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use super::forwarder::ProxyBody;

pub struct H2cPool {
    connections: DashMap<String, Arc<H2cConnection>>,
}

struct H2cConnection {
    sender: Mutex<Option<SendRequest<ProxyBody>>>,
}

#[derive(Debug)]
pub enum H2cError {
    Connect(std::io::Error),
    Handshake(hyper::Error),
    NotReady(hyper::Error),
    Request(hyper::Error),
    ConnectionClosed,
}

impl std::fmt::Display for H2cError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            H2cError::Connect(e) => write!(f, "connect failed: {e}"),
            H2cError::Handshake(e) => write!(f, "http/2 handshake failed: {e}"),
            H2cError::NotReady(e) => write!(f, "connection not ready: {e}"),
            H2cError::Request(e) => write!(f, "request failed: {e}"),
            H2cError::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for H2cError {}

impl H2cPool {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub async fn send(
        &self,
        authority: &str,
        req: Request<ProxyBody>,
    ) -> Result<Response<hyper::body::Incoming>, H2cError> {
        let conn = self.get_or_connect(authority).await?;
        match conn.send(req).await {
            Err(H2cError::ConnectionClosed) => {
                self.connections.remove(authority);
                Err(H2cError::ConnectionClosed)
            }
            other => other,
        }
    }

    async fn get_or_connect(&self, authority: &str) -> Result<Arc<H2cConnection>, H2cError> {
        let existing = self.connections.get(authority).map(|r| Arc::clone(&r));
        if let Some(conn) = existing {
            if conn.is_ready().await {
                return Ok(conn);
            }
        }

        let conn = self.connect(authority).await?;
        self.connections
            .insert(authority.to_string(), Arc::clone(&conn));
        Ok(conn)
    }

    async fn connect(&self, authority: &str) -> Result<Arc<H2cConnection>, H2cError> {
        debug!("opening h2c connection to {authority}");

        let stream = TcpStream::connect(authority).await.map_err(H2cError::Connect)?;
        stream.set_nodelay(true).ok();
        let io = TokioIo::new(stream);

        let (sender, conn) = hyper::client::conn::http2::handshake(TokioExecutor::new(), io)
            .await
            .map_err(H2cError::Handshake)?;

        let authority = authority.to_string();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("h2c connection to {authority} closed: {e}");
            }
        });

        Ok(Arc::new(H2cConnection {
            sender: Mutex::new(Some(sender)),
        }))
    }
}

impl Default for H2cPool {
    fn default() -> Self {
        Self::new()
    }
}

impl H2cConnection {
    async fn is_ready(&self) -> bool {
        match self.sender.lock().await.as_ref() {
            Some(sender) => sender.is_ready(),
            None => false,
        }
    }

    async fn send(
        &self,
        req: Request<ProxyBody>,
    ) -> Result<Response<hyper::body::Incoming>, H2cError> {
        let mut guard = self.sender.lock().await;
        match guard.as_mut() {
            Some(sender) => {
                sender.ready().await.map_err(H2cError::NotReady)?;
                sender.send_request(req).await.map_err(H2cError::Request)
            }
            None => Err(H2cError::ConnectionClosed),
        }
    }
}
