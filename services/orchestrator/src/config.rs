//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Account passwords and the webhook URL deserialize straight into
//! `Secret` so plaintext never sits in a plain `String` field.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use checkout::{TaskKind, WorkflowLimits};
use common::Secret;
use proxy_pool::ProxyEndpoint;
use transport::SessionConfig;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    pub storefront: StorefrontConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Proxy endpoints as `host:port` or `host:port:username:password`.
    #[serde(default)]
    pub proxies: Vec<String>,
    pub accounts: Vec<AccountConfig>,
}

/// Remote storefront settings
#[derive(Debug, Deserialize)]
pub struct StorefrontConfig {
    pub base_url: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Region used for login before the billing address has been seen.
    pub default_region: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub challenge_marker: Option<String>,
}

impl StorefrontConfig {
    /// Session tunables, falling back to the transport defaults for
    /// anything not set.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(marker) = &self.challenge_marker {
            config.challenge_marker = marker.clone();
        }
        config
    }
}

/// Workflow tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_setup_attempts: u32,
    pub max_advance_attempts: u32,
    pub max_payment_attempts: u32,
    pub payment_attempt_ceiling: u32,
    pub filler_variant_id: u64,
    pub watch_retry_delay_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = WorkflowLimits::default();
        Self {
            max_setup_attempts: limits.max_setup_attempts,
            max_advance_attempts: limits.max_advance_attempts,
            max_payment_attempts: limits.max_payment_attempts,
            payment_attempt_ceiling: limits.payment_attempt_ceiling,
            filler_variant_id: limits.filler_variant_id,
            watch_retry_delay_ms: limits.watch_retry_delay.as_millis() as u64,
        }
    }
}

impl LimitsConfig {
    pub fn workflow_limits(&self) -> WorkflowLimits {
        WorkflowLimits {
            max_setup_attempts: self.max_setup_attempts,
            max_advance_attempts: self.max_advance_attempts,
            max_payment_attempts: self.max_payment_attempts,
            payment_attempt_ceiling: self.payment_attempt_ceiling,
            filler_variant_id: self.filler_variant_id,
            watch_retry_delay: Duration::from_millis(self.watch_retry_delay_ms),
        }
    }
}

/// Outbound notification settings
#[derive(Debug, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<Secret<String>>,
}

/// One account record
#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    pub email: String,
    pub password: Secret<String>,
    #[serde(default = "default_task_kind")]
    pub kind: TaskKind,
}

fn default_max_connections() -> usize {
    64
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_task_kind() -> TaskKind {
    TaskKind::Variant
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        if !config.storefront.base_url.starts_with("http://")
            && !config.storefront.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "storefront.base_url must start with http:// or https://, got: {}",
                config.storefront.base_url
            )));
        }

        if config.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.accounts.is_empty() {
            return Err(common::Error::Config(
                "at least one account must be configured".into(),
            ));
        }

        // Every proxy string must parse; a typo'd endpoint silently missing
        // from the pool would be much harder to spot at runtime.
        config.proxy_endpoints()?;

        Ok(config)
    }

    /// Parse the configured proxy strings into pool endpoints.
    pub fn proxy_endpoints(&self) -> common::Result<Vec<ProxyEndpoint>> {
        self.proxies
            .iter()
            .map(|s| {
                s.parse::<ProxyEndpoint>()
                    .map_err(|e| common::Error::Config(e.to_string()))
            })
            .collect()
    }

    /// Resolve config file path from CLI arg or SLATE_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("SLATE_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("slate.toml")
    }
}
