//! Server configuration.

use portcullis_render::RenderConfig;
use std::time::Duration;

/// Configuration for a Portcullis application.
///
/// # Example
///
/// ```
/// use portcullis_server::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new()
///     .shutdown_timeout(Duration::from_secs(10))
///     .trust_proxy(true);
/// assert!(config.trust_proxy_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    shutdown_timeout: Duration,
    trust_proxy: bool,
    render: RenderConfig,
}

impl ServerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long shutdown waits for in-flight connections.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Trusts `X-Forwarded-Proto` from the peer when deciding whether a
    /// request arrived over a secure channel.
    #[must_use]
    pub const fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Sets the renderer configuration.
    #[must_use]
    pub fn render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// The configured shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout_value(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Whether forwarded-protocol headers are trusted.
    #[must_use]
    pub const fn trust_proxy_enabled(&self) -> bool {
        self.trust_proxy
    }

    /// The renderer configuration.
    #[must_use]
    pub const fn render_config(&self) -> &RenderConfig {
        &self.render
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
            trust_proxy: true,
            render: RenderConfig::default(),
        }
    }
}
