use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HOST, DEFAULT_PORT, ENV_GATEWAY_API_KEY, ENV_GATEWAY_UPSTREAM_URL, PLACEHOLDER_API_KEY,
};
use crate::error::GatewayError;

#[derive(Parser, Debug, Clone)]
#[command(name = "dialect-gateway")]
#[command(about = "self-healing local gateway from chat-completions clients to a messages API")]
pub struct Config {
    #[arg(long, default_value = DEFAULT_HOST, help = "interface to listen on")]
    pub host: String,

    #[arg(long, default_value_t = DEFAULT_PORT, help = "preferred listen port")]
    pub port: u16,

    #[arg(
        long,
        default_value_t = u16::MAX,
        help = "highest port tried when the preferred one is taken"
    )]
    pub max_port: u16,

    #[arg(long, env = ENV_GATEWAY_UPSTREAM_URL, help = "upstream messages API base url")]
    pub api_url: Option<String>,

    #[arg(long, env = ENV_GATEWAY_API_KEY, hide_env_values = true, help = "upstream API key")]
    pub api_key: Option<String>,

    #[arg(long, default_value = "claude-3-opus-20240229", help = "model for complex requests")]
    pub big_model: String,

    #[arg(long, default_value = "claude-3-haiku-20240307", help = "model for simple requests")]
    pub small_model: String,

    #[arg(long, help = "json settings file ({apiUrl, apiKey, bigModel, smallModel, proxyPort})")]
    pub settings: Option<PathBuf>,

    #[arg(long, help = "disable automatic restart when health checks fail")]
    pub no_auto_restart: bool,

    #[arg(long, default_value = "3", help = "restart attempts before giving up")]
    pub max_retries: u32,

    #[arg(long, default_value = "5000", help = "delay between restart attempts (ms)")]
    pub retry_delay_ms: u64,

    #[arg(long, default_value = "30000", help = "health check interval (ms)")]
    pub health_check_interval_ms: u64,

    #[arg(long, default_value = "120", help = "upstream request timeout in seconds")]
    pub request_timeout_secs: u64,

    #[arg(long, default_value = "3", help = "attempts per upstream call (1 disables retries)")]
    pub upstream_attempts: u32,

    #[arg(long, help = "print the environment for child processes once started")]
    pub print_env: bool,

    #[arg(
        long,
        default_value = "info",
        help = "log level (off, error, warn, info, debug, trace)"
    )]
    pub log_level: String,
}

/// Backoff for retrying a single upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Everything one start cycle of the gateway runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub max_port: u16,
    pub api_key: String,
    pub upstream_base_url: String,
    pub big_model: String,
    pub small_model: String,
    pub auto_restart: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub health_check_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub upstream_retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_port: u16::MAX,
            api_key: String::new(),
            upstream_base_url: String::new(),
            big_model: "claude-3-opus-20240229".to_string(),
            small_model: "claude-3-haiku-20240307".to_string(),
            auto_restart: true,
            max_retries: 3,
            retry_delay_ms: 5000,
            health_check_interval_ms: 30_000,
            request_timeout_secs: 120,
            upstream_retry: RetryPolicy::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_cli(cfg: &Config) -> Result<Self, GatewayError> {
        let mut config = GatewayConfig {
            host: cfg.host.clone(),
            port: cfg.port,
            max_port: cfg.max_port,
            api_key: cfg.api_key.clone().unwrap_or_default(),
            upstream_base_url: cfg.api_url.clone().unwrap_or_default(),
            big_model: cfg.big_model.clone(),
            small_model: cfg.small_model.clone(),
            auto_restart: !cfg.no_auto_restart,
            max_retries: cfg.max_retries,
            retry_delay_ms: cfg.retry_delay_ms,
            health_check_interval_ms: cfg.health_check_interval_ms,
            request_timeout_secs: cfg.request_timeout_secs,
            upstream_retry: RetryPolicy {
                max_attempts: cfg.upstream_attempts.max(1),
                ..RetryPolicy::default()
            },
        };

        if let Some(path) = &cfg.settings {
            CollaboratorSettings::load(path)?.apply_to(&mut config);
        }

        Ok(config)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Settings as stored by the front end's config store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub big_model: Option<String>,
    pub small_model: Option<String>,
    pub proxy_port: Option<u16>,
}

impl CollaboratorSettings {
    pub fn load(path: &std::path::Path) -> Result<Self, GatewayError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Configuration(format!("invalid settings in {}: {}", path.display(), e))
        })
    }

    /// Overlays the settings that are present onto `config`.
    pub fn apply_to(self, config: &mut GatewayConfig) {
        if let Some(api_url) = self.api_url {
            config.upstream_base_url = api_url;
        }
        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }
        if let Some(big_model) = self.big_model {
            config.big_model = big_model;
        }
        if let Some(small_model) = self.small_model {
            config.small_model = small_model;
        }
        if let Some(port) = self.proxy_port {
            config.port = port;
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), GatewayError> {
    if config.api_key.trim().is_empty() {
        return Err(GatewayError::Configuration(
            "API key is required".to_string(),
        ));
    }
    // the key handed to child processes; seeing it here means the gateway
    // would forward into itself
    if config.api_key.trim() == PLACEHOLDER_API_KEY {
        return Err(GatewayError::Configuration(
            "API key is the gateway placeholder; supply the real upstream key".to_string(),
        ));
    }
    if config.upstream_base_url.trim().is_empty() {
        return Err(GatewayError::Configuration(
            "upstream base URL is required".to_string(),
        ));
    }
    if !config.upstream_base_url.starts_with("http://")
        && !config.upstream_base_url.starts_with("https://")
    {
        return Err(GatewayError::Configuration(format!(
            "invalid upstream URL (must start with http:// or https://): {}",
            config.upstream_base_url
        )));
    }
    if let Err(e) = url::Url::parse(&config.upstream_base_url) {
        return Err(GatewayError::Configuration(format!(
            "invalid upstream URL format: {}",
            e
        )));
    }
    if config.host.parse::<std::net::IpAddr>().is_err() && config.host != "localhost" {
        return Err(GatewayError::Configuration(format!(
            "invalid listen host: {}",
            config.host
        )));
    }
    if config.port == 0 {
        return Err(GatewayError::Configuration(
            "port must be non-zero".to_string(),
        ));
    }
    if config.max_port < config.port {
        return Err(GatewayError::Configuration(format!(
            "max port {} is below preferred port {}",
            config.max_port, config.port
        )));
    }
    Ok(())
}
