//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `PVECTL_CONFIG`
//! environment variable.
//!
//! Sources are merged in order (later overrides earlier):
//!
//! 1. **YAML config file** - base configuration
//! 2. **Environment variables** - `PVECTL_`-prefixed, `__` for nesting
//!    (e.g. `PVECTL_PROXMOX__TOKEN_SECRET=...`)
//! 3. **DATABASE_URL** - special case, overrides `database_url` if set

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::db::models::quotas::QuotaCreateDBRequest;
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PVECTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// PostgreSQL connection string
    pub database_url: String,
    /// Secret key for session token signing (required)
    pub secret_key: Option<String>,
    /// Proxmox VE cluster connection settings
    pub proxmox: ProxmoxConfig,
    /// Login and session settings
    pub auth: AuthConfig,
    /// Quota defaults and enforcement policy
    pub quota: QuotaConfig,
    /// Claim reconciliation behaviour
    pub claim: ClaimConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: "postgres://localhost:5432/pvectl".to_string(),
            secret_key: None,
            proxmox: ProxmoxConfig::default(),
            auth: AuthConfig::default(),
            quota: QuotaConfig::default(),
            claim: ClaimConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

/// Proxmox VE API connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxmoxConfig {
    /// Base URL of the Proxmox API, e.g. "https://pve.example.com:8006"
    pub url: Url,
    /// API token id in "user@realm!tokenname" form
    pub token_id: String,
    /// API token secret
    pub token_secret: String,
    /// Verify the cluster's TLS certificate (clusters commonly run self-signed)
    pub verify_tls: bool,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ProxmoxConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://localhost:8006").expect("static url"),
            token_id: String::new(),
            token_secret: String::new(),
            verify_tls: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Login and session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// OAuth client id the identity assertion's audience must match
    pub google_client_id: String,
    /// JWKS endpoint for assertion signature verification.
    /// Overridable so tests can point it at a local stub.
    pub google_certs_url: Url,
    /// Session token expiry
    #[serde(with = "humantime_serde")]
    pub session_expiry: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            google_client_id: String::new(),
            google_certs_url: Url::parse("https://www.googleapis.com/oauth2/v3/certs").expect("static url"),
            session_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }
}

/// What to do when the quota engine cannot reach the cluster to compute
/// current usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementMode {
    /// Admit and log a warning (availability over strict enforcement)
    FailOpen,
    /// Reject with an upstream error
    FailClosed,
}

/// Quota defaults applied to newly created accounts, plus the enforcement
/// policy for upstream failures during the usage check.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaConfig {
    pub default_max_vcpus: i64,
    pub default_max_ram_gb: i64,
    pub default_max_disk_gb: i64,
    pub default_allowed_networks: Vec<String>,
    pub enforcement: EnforcementMode,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_max_vcpus: 8,
            default_max_ram_gb: 16,
            default_max_disk_gb: 200,
            default_allowed_networks: vec![],
            enforcement: EnforcementMode::FailOpen,
        }
    }
}

impl QuotaConfig {
    /// The quota row inserted alongside a freshly created account.
    pub fn default_quota(&self) -> QuotaCreateDBRequest {
        QuotaCreateDBRequest {
            max_vcpus: self.default_max_vcpus,
            max_ram_gb: self.default_max_ram_gb,
            max_disk_gb: self.default_max_disk_gb,
            allowed_networks: self.default_allowed_networks.join(","),
        }
    }
}

/// Claim reconciliation behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaimConfig {
    /// Run a claim pass at startup when an approved admin already exists
    pub run_on_startup: bool,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self { run_on_startup: true }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Url(Url::parse("http://localhost:5173").expect("static url"))],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification: wildcard (`*`) or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("PVECTL_").split("__"))
    }

    /// Check the invariants a running server depends on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().unwrap_or("").is_empty() {
            return Err(Error::BadRequest {
                message: "secret_key is required for session token signing".to_string(),
            });
        }
        if self.proxmox.token_id.is_empty() || self.proxmox.token_secret.is_empty() {
            return Err(Error::BadRequest {
                message: "proxmox.token_id and proxmox.token_secret are required".to_string(),
            });
        }
        if self.auth.google_client_id.is_empty() {
            return Err(Error::BadRequest {
                message: "auth.google_client_id is required".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn valid_config() -> Config {
        Config {
            secret_key: Some("test-secret".to_string()),
            proxmox: ProxmoxConfig {
                token_id: "api@pam!pvectl".to_string(),
                token_secret: "s3cret".to_string(),
                ..Default::default()
            },
            auth: AuthConfig {
                google_client_id: "client-id.apps.googleusercontent.com".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_loadable_but_invalid() {
        let config = Config::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.quota.default_max_vcpus, 8);
        assert_eq!(config.quota.default_max_ram_gb, 16);
        assert_eq!(config.quota.default_max_disk_gb, 200);
        assert_eq!(config.quota.enforcement, EnforcementMode::FailOpen);
        // No secret key, no token: not a runnable config.
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                port: 4000
                secret_key: from-yaml
                quota:
                  enforcement: fail-closed
                "#,
            )?;
            jail.set_env("PVECTL_PORT", "5000");
            jail.set_env("PVECTL_PROXMOX__TOKEN_ID", "api@pam!t");

            let args = Args {
                config: "config.yaml".to_string(),
                validate: false,
            };
            let config: Config = Config::figment(&args).extract()?;
            assert_eq!(config.port, 5000);
            assert_eq!(config.secret_key.as_deref(), Some("from-yaml"));
            assert_eq!(config.proxmox.token_id, "api@pam!t");
            assert_eq!(config.quota.enforcement, EnforcementMode::FailClosed);
            Ok(())
        });
    }

    #[test]
    fn default_quota_joins_networks() {
        let mut qc = QuotaConfig::default();
        qc.default_allowed_networks = vec!["vmbr0".to_string(), "vmbr1".to_string()];
        assert_eq!(qc.default_quota().allowed_networks, "vmbr0,vmbr1");
    }
}
