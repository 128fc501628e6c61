use log::LevelFilter;

/// Environment variable naming the credential source.
pub const API_KEYS_FILE_ENV: &str = "OPENAI_API_KEYS_FILE";
/// Mounted-secret location used when the environment does not override it.
pub const DEFAULT_API_KEYS_FILE: &str = "/etc/secrets/api-keys";
pub const DEFAULT_BYPASS_PATHS: [&str; 2] = ["/health", "/healthz"];
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("Bypass path '{path}' must start with '/'")]
    InvalidBypassPath { path: String },

    #[error("max_payload_size must be greater than zero")]
    ZeroPayloadLimit,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Line-oriented file holding one bearer token per line
    pub api_keys_file: String,
    /// Paths forwarded without authentication, matched exactly
    pub bypass_paths: Vec<String>,
    pub host: String,
    pub port: u16,
    /// Base URL of the OpenAI-compatible inference server
    pub upstream_url: String,
    /// Total upstream request timeout. `None` leaves timing to the upstream.
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
    pub max_payload_size: usize,
    pub log_level: LevelFilter,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            api_keys_file: DEFAULT_API_KEYS_FILE.to_string(),
            bypass_paths: DEFAULT_BYPASS_PATHS.iter().map(|p| p.to_string()).collect(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            request_timeout_secs: None,
            connect_timeout_secs: 10,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            log_level: LevelFilter::Info,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.upstream_url.as_str();
        match url.split_once("://") {
            Some(("http" | "https", rest)) if !rest.is_empty() => {}
            Some((_, rest)) if rest.is_empty() => {
                return Err(ConfigError::InvalidUpstreamUrl {
                    url: url.to_string(),
                    reason: "missing host".to_string(),
                });
            }
            _ => {
                return Err(ConfigError::InvalidUpstreamUrl {
                    url: url.to_string(),
                    reason: "scheme must be http or https".to_string(),
                });
            }
        }

        if let Some(path) = self.bypass_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidBypassPath { path: path.clone() });
        }

        if self.max_payload_size == 0 {
            return Err(ConfigError::ZeroPayloadLimit);
        }

        Ok(())
    }
}
