//! Renderer configuration.

/// Settings for the default response renderer.
///
/// # Example
///
/// ```
/// use portcullis_render::RenderConfig;
///
/// let config = RenderConfig::new()
///     .frame_options("sameorigin")
///     .nosniff(true);
/// assert_eq!(config.frame_options_value(), "sameorigin");
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    frame_options: String,
    nosniff: bool,
    charset: String,
}

impl RenderConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `X-Frame-Options` value attached to HTML responses.
    #[must_use]
    pub fn frame_options(mut self, value: impl Into<String>) -> Self {
        self.frame_options = value.into();
        self
    }

    /// Toggles the `X-Content-Type-Options: nosniff` header.
    #[must_use]
    pub const fn nosniff(mut self, enabled: bool) -> Self {
        self.nosniff = enabled;
        self
    }

    /// Sets the charset appended to text content types that lack one.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// The configured `X-Frame-Options` value.
    #[must_use]
    pub fn frame_options_value(&self) -> &str {
        &self.frame_options
    }

    /// Whether `X-Content-Type-Options: nosniff` is attached.
    #[must_use]
    pub const fn nosniff_enabled(&self) -> bool {
        self.nosniff
    }

    /// The configured charset.
    #[must_use]
    pub fn charset_value(&self) -> &str {
        &self.charset
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_options: "deny".to_string(),
            nosniff: true,
            charset: "utf-8".to_string(),
        }
    }
}
