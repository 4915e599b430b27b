use std::sync::Arc;

use super::types::ProxyConfig;

/// Abstracts "yield the current [`ProxyConfig`] snapshot" so the dispatcher
/// never depends on how the snapshot was produced.
///
/// The only implementation shipped is [`StaticConfigProvider`] — dynamic
/// reload is an explicit non-goal, but the seam lives here rather than
/// being baked into the dispatcher.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> Arc<ProxyConfig>;
}

/// Loads a [`ProxyConfig`] once and hands out cheap clones of the same
/// `Arc` for the lifetime of the process.
pub struct StaticConfigProvider {
    config: Arc<ProxyConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn current(&self) -> Arc<ProxyConfig> {
        Arc::clone(&self.config)
    }
}
