mod dispatcher;
mod error;
mod forwarder;
mod grpc;
mod h2c;
mod responses;

pub use dispatcher::Dispatcher;
pub use error::ProxyError;
pub use forwarder::{Forwarder, ProxyBody};
