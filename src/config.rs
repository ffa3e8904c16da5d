use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration of the gateway
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Base URL of the transcription service (also used for `/extract`)
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    /// Base URL of the recipe parser service, defaults to `upstream_url`
    #[serde(default)]
    pub parser_url: Option<String>,
    /// Total upstream request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upstream connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Largest accepted file upload, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Number of characters of an upstream body kept in error envelopes
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_url: default_upstream_url(),
            parser_url: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            preview_chars: default_preview_chars(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_upload_bytes() -> u64 {
    60 * 1024 * 1024
}

fn default_preview_chars() -> usize {
    800
}

impl GatewayConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE_CAPTURE__ prefix
    /// 2. recipe-capture.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE_CAPTURE__UPSTREAM_URL
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }

    /// Config pointing every upstream at `url`, everything else default.
    pub fn with_upstream(url: impl Into<String>) -> Self {
        Self {
            upstream_url: url.into(),
            ..Self::default()
        }
    }

    pub fn transcriber_url(&self) -> &str {
        trim_base(&self.upstream_url)
    }

    pub fn parser_url(&self) -> &str {
        trim_base(self.parser_url.as_deref().unwrap_or(&self.upstream_url))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Load configuration from file and environment variables
///
/// See [`GatewayConfig::load`] for the precedence rules.
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("recipe-capture").required(false))
        .add_source(
            Environment::with_prefix("RECIPE_CAPTURE")
                .prefix_separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.upstream_url, "http://127.0.0.1:8000");
        assert!(config.parser_url.is_none());
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.max_upload_bytes, 60 * 1024 * 1024);
        assert_eq!(config.preview_chars, 800);
    }

    #[test]
    fn test_parser_url_falls_back_to_upstream() {
        let mut config = GatewayConfig::with_upstream("http://localhost:9000/");
        assert_eq!(config.transcriber_url(), "http://localhost:9000");
        assert_eq!(config.parser_url(), "http://localhost:9000");

        config.parser_url = Some("http://localhost:8001".to_string());
        assert_eq!(config.parser_url(), "http://localhost:8001");
        assert_eq!(config.transcriber_url(), "http://localhost:9000");
    }

    #[test]
    fn test_deserialize_partial_source() {
        let config: GatewayConfig = Config::builder()
            .set_override("upstream_url", "http://10.0.0.2:8000")
            .unwrap()
            .set_override("max_upload_bytes", 1024)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.upstream_url, "http://10.0.0.2:8000");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }
}
