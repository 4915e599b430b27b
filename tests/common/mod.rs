//! Shared plumbing for the integration tests: a minimal in-process
//! backend server and a minimal in-process proxy listener, both reusing
//! the same auto HTTP/1.1-or-HTTP/2 builder the real listener uses, plus
//! bare client connections so a test can choose HTTP/1.1 or HTTP/2
//! without going through a pooled client.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{HeaderMap, Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio::net::{TcpListener, TcpStream};

use switchboard::proxy::Dispatcher;

pub type TestBody = BoxBody<Bytes, hyper::Error>;

pub fn full(body: impl Into<Bytes>) -> TestBody {
    Full::new(body.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

struct FramedBody {
    frames: VecDeque<Frame<Bytes>>,
}

impl Body for FramedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().frames.pop_front().map(Ok))
    }
}

/// A one-shot body: a single data frame followed by a trailers frame,
/// used to exercise trailer propagation through the forwarder.
pub fn body_with_trailers(data: impl Into<Bytes>, trailers: HeaderMap) -> TestBody {
    let mut frames = VecDeque::new();
    frames.push_back(Frame::data(data.into()));
    frames.push_back(Frame::trailers(trailers));
    FramedBody { frames }
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// Bind a backend on an OS-assigned port and serve `handler` forever in a
/// background task. Returns the address to point a route's destination
/// at.
pub async fn spawn_backend<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Response<TestBody>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
    let addr = listener.local_addr().expect("local_addr");

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => continue,
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler(req).await) }
                });
                let builder = AutoBuilder::new(TokioExecutor::new());
                let _ = builder.serve_connection_with_upgrades(io, service).await;
            });
        }
    });

    addr
}

/// Bind the proxy under test (a [`Dispatcher`]) on an OS-assigned port.
/// Mirrors `server::Listener::serve_connection` exactly, minus TLS.
pub async fn spawn_proxy(dispatcher: Arc<Dispatcher>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind proxy");
    let addr = listener.local_addr().expect("local_addr");

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => continue,
            };
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let dispatcher = Arc::clone(&dispatcher);
                    async move { Ok::<_, Infallible>(dispatcher.dispatch(req).await) }
                });
                let builder = AutoBuilder::new(TokioExecutor::new());
                let _ = builder.serve_connection_with_upgrades(io, service).await;
            });
        }
    });

    addr
}

pub async fn send_http1(addr: SocketAddr, req: Request<TestBody>) -> Response<Incoming> {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .expect("http/1.1 handshake");
    tokio::spawn(async move {
        let _ = conn.await;
    });
    sender.send_request(req).await.expect("send request")
}

/// A plaintext, prior-knowledge HTTP/2 request — the same strategy the
/// forwarder itself uses against plaintext gRPC destinations.
pub async fn send_http2(addr: SocketAddr, req: Request<TestBody>) -> Response<Incoming> {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http2::handshake(TokioExecutor::new(), io)
        .await
        .expect("http/2 handshake");
    tokio::spawn(async move {
        let _ = conn.await;
    });
    sender.send_request(req).await.expect("send request")
}
