//! Server configuration
//!
//! Everything comes from the process environment, with CLI overrides
//! applied in `main`. Validation is fail-fast: a process that cannot sign
//! mandates or reach its store should not accept traffic.

use agentpay_db::DatabaseConfig;
use anyhow::{bail, Context};

/// Default cap on direct-rail amounts, in minor units
const DEFAULT_DIRECT_MAX_AMOUNT: i64 = 200;

/// Full server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// 64-hex-char Ed25519 seed; never logged
    pub signing_key: String,

    pub database: DatabaseConfig,

    /// Card rail credentials; both present or the rail is disabled
    pub card_app_id: Option<String>,
    pub card_secret: Option<String>,

    pub direct_timeout_ms: u64,
    pub direct_max_amount: i64,
    pub direct_webhook_secret: Option<String>,

    /// HS256 secret for agent bearer tokens
    pub token_secret: String,

    pub allowed_origins: Vec<String>,
    pub log_level: String,
    pub log_format: String,
    /// `development` or `production`
    pub app_env: String,

    pub idempotency_retention_hours: i64,
    pub shutdown_timeout_secs: u64,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let signing_key =
            env_opt("SIGNING_KEY").context("SIGNING_KEY must be set (64 hex chars)")?;

        let database = DatabaseConfig::from_env()
            .map_err(|e| anyhow::anyhow!(e))
            .context("database configuration")?;

        Ok(Self {
            host: env_opt("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse("PORT", 8080),
            signing_key,
            database,
            card_app_id: env_opt("CARD_RAIL_APP_ID"),
            card_secret: env_opt("CARD_RAIL_SECRET"),
            direct_timeout_ms: env_parse("DIRECT_RAIL_TIMEOUT_MS", 5000),
            direct_max_amount: env_parse("DIRECT_MAX_AMOUNT", DEFAULT_DIRECT_MAX_AMOUNT),
            direct_webhook_secret: env_opt("DIRECT_RAIL_WEBHOOK_SECRET"),
            token_secret: env_opt("API_TOKEN_SECRET")
                .unwrap_or_else(|| "change-me-in-production".to_string()),
            allowed_origins: env_opt("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            log_level: env_opt("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: env_opt("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
            app_env: env_opt("APP_ENV").unwrap_or_else(|| "development".to_string()),
            idempotency_retention_hours: env_parse("IDEMPOTENCY_RETENTION_HOURS", 24),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 10),
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    pub fn card_rail_enabled(&self) -> bool {
        self.card_app_id.is_some() || self.card_secret.is_some()
    }

    /// Fail-fast validation before the listener binds
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.signing_key.len() != 64 || !self.signing_key.bytes().all(|b| b.is_ascii_hexdigit())
        {
            bail!("SIGNING_KEY must be exactly 64 hex characters (Ed25519 seed)");
        }

        match (&self.card_app_id, &self.card_secret) {
            (Some(_), Some(_)) | (None, None) => {}
            _ => bail!("CARD_RAIL_APP_ID and CARD_RAIL_SECRET must be set together"),
        }

        if self.is_production() && self.token_secret == "change-me-in-production" {
            bail!("API_TOKEN_SECRET must be changed in production");
        }

        if self.direct_max_amount < 0 {
            bail!("DIRECT_MAX_AMOUNT must be non-negative");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            signing_key: "ab".repeat(32),
            database: DatabaseConfig::default(),
            card_app_id: None,
            card_secret: None,
            direct_timeout_ms: 5000,
            direct_max_amount: 200,
            direct_webhook_secret: None,
            token_secret: "test-secret".to_string(),
            allowed_origins: vec![],
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            app_env: "development".to_string(),
            idempotency_retention_hours: 24,
            shutdown_timeout_secs: 10,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_signing_key_length_enforced() {
        let mut c = base();
        c.signing_key = "abcd".to_string();
        assert!(c.validate().is_err());

        c.signing_key = "zz".repeat(32);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_card_credentials_come_in_pairs() {
        let mut c = base();
        c.card_app_id = Some("TEST123".to_string());
        assert!(c.validate().is_err());

        c.card_secret = Some("secret".to_string());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_production_refuses_default_token_secret() {
        let mut c = base();
        c.app_env = "production".to_string();
        c.token_secret = "change-me-in-production".to_string();
        assert!(c.validate().is_err());
    }
}
