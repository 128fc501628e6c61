use clap::Parser;
use llm_auth_gate_rs::config::{
    API_KEYS_FILE_ENV, DEFAULT_API_KEYS_FILE, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_UPSTREAM_URL,
    GateConfig,
};
use llm_auth_gate_rs::credentials::CredentialStore;
use llm_auth_gate_rs::logging::init_logging;
use llm_auth_gate_rs::server;
use log::{LevelFilter, info, warn};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "llm-auth-gate")]
#[command(about = "Bearer-token authentication gate for an OpenAI-compatible inference API")]
#[command(long_about = r#"
Bearer-token authentication gate for an OpenAI-compatible inference API

Every request must carry `Authorization: Bearer <token>` with a token listed in
the API keys file (one per line, `#` comments and blank lines ignored). Health
check paths are forwarded without authentication.

Examples:
  llm-auth-gate --upstream-url http://127.0.0.1:8000 --port 8080

  OPENAI_API_KEYS_FILE=./api-keys llm-auth-gate --bypass-path /health --bypass-path /ready
"#)]
struct CliArgs {
    /// File holding the valid API keys, one per line
    #[arg(long, env = API_KEYS_FILE_ENV, default_value = DEFAULT_API_KEYS_FILE)]
    api_keys_file: String,

    /// Path served without authentication (repeatable)
    #[arg(long = "bypass-path", default_values_t = vec!["/health".to_string(), "/healthz".to_string()])]
    bypass_paths: Vec<String>,

    /// Host address to bind the gate
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the gate
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the inference server requests are forwarded to
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    upstream_url: String,

    /// Total timeout in seconds for an upstream request (unset: no timeout)
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Timeout in seconds for establishing the upstream connection
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
    max_payload_size: usize,

    /// Log level
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    log_level: String,
}

impl CliArgs {
    fn to_gate_config(&self) -> GateConfig {
        let log_level = match self.log_level.as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        };
        GateConfig {
            api_keys_file: self.api_keys_file.clone(),
            bypass_paths: self.bypass_paths.clone(),
            host: self.host.clone(),
            port: self.port,
            upstream_url: self.upstream_url.clone(),
            request_timeout_secs: self.request_timeout_secs,
            connect_timeout_secs: self.connect_timeout_secs,
            max_payload_size: self.max_payload_size,
            log_level,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = args.to_gate_config();
    config.validate()?;

    init_logging(config.log_level);

    let store = CredentialStore::load(&config.api_keys_file);
    if store.is_empty() {
        warn!(
            "No API keys loaded from {}; every authenticated request will be rejected",
            store.source_path().display()
        );
    }

    actix_web::rt::System::new().block_on(async move {
        tokio::select! {
            res = server::startup(config, store) => res,
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                Ok(())
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = CliArgs::try_parse_from(["llm-auth-gate", "--api-keys-file", "/tmp/keys"])
            .unwrap();
        let config = args.to_gate_config();
        assert_eq!(config.api_keys_file, "/tmp/keys");
        assert_eq!(config.bypass_paths, vec!["/health", "/healthz"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout_secs, None);
        assert_eq!(config.log_level, LevelFilter::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let args = CliArgs::try_parse_from([
            "llm-auth-gate",
            "--api-keys-file",
            "/run/keys",
            "--bypass-path",
            "/ready",
            "--bypass-path",
            "/live",
            "--upstream-url",
            "http://vllm:8000",
            "--port",
            "9000",
            "--request-timeout-secs",
            "600",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = args.to_gate_config();
        assert_eq!(config.bypass_paths, vec!["/ready", "/live"]);
        assert_eq!(config.upstream_url, "http://vllm:8000");
        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout_secs, Some(600));
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_cli_rejects_unknown_log_level() {
        assert!(
            CliArgs::try_parse_from(["llm-auth-gate", "--log-level", "verbose"]).is_err()
        );
    }
}
