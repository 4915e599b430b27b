//! Server-side TLS setup. Unchanged in approach from the teacher: load a
//! single certificate/key pair, advertise both protocols over ALPN, and
//! let `hyper_util`'s auto builder pick HTTP/1.1 or HTTP/2 per connection.

use anyhow::{Context, Result};
use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use crate::config::ListenConfig;

pub struct TlsAcceptor {
    config: Arc<ServerConfig>,
}

impl TlsAcceptor {
    /// Build an acceptor from `PROXY_TLS_CERT`/`PROXY_TLS_KEY`, if present.
    /// Returns `Ok(None)` when TLS is disabled or no paths were supplied.
    pub fn from_listen_config(listen: &ListenConfig) -> Result<Option<Self>> {
        if !listen.enable_tls {
            return Ok(None);
        }

        let (Some(cert_path), Some(key_path)) =
            (&listen.tls_cert_path, &listen.tls_key_path)
        else {
            return Ok(None);
        };

        let config = Self::build_server_config(cert_path, key_path)?;
        Ok(Some(Self {
            config: Arc::new(config),
        }))
    }

    fn build_server_config(cert_path: &str, key_path: &str) -> Result<ServerConfig> {
        let cert_file = File::open(cert_path)
            .with_context(|| format!("failed to open cert file: {cert_path}"))?;
        let mut cert_reader = BufReader::new(cert_file);
        let certs: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .context("failed to parse certificates")?;

        let key_file = File::open(key_path)
            .with_context(|| format!("failed to open key file: {key_path}"))?;
        let mut key_reader = BufReader::new(key_file);
        let key = private_key(&mut key_reader)
            .context("failed to parse private key")?
            .ok_or_else(|| anyhow::anyhow!("no private key found in {key_path}"))?;

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("failed to build TLS server config")?;

        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(config)
    }

    pub fn get_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.config)
    }
}
