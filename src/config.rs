use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

use crate::services::provisioning_service::ProvisioningSettings;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub default_mailbox_limit: i64,
    pub max_address_attempts: u32,
    pub batch_timeout_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-tenant mailbox provisioning API")]
pub struct Args {
    /// Host to bind to (overrides MAILHOST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MAILHOST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides MAILHOST_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Mailbox limit for tenants without an explicit quota (overrides MAILHOST_DEFAULT_MAILBOX_LIMIT)
    #[arg(long)]
    pub default_mailbox_limit: Option<i64>,

    /// Candidate addresses tried before giving up (overrides MAILHOST_MAX_ADDRESS_ATTEMPTS)
    #[arg(long)]
    pub max_address_attempts: Option<u32>,

    /// Upper bound for one bulk provisioning call, in seconds (overrides MAILHOST_BATCH_TIMEOUT_SECS)
    #[arg(long)]
    pub batch_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

pub const DEFAULT_MAILBOX_LIMIT: i64 = 10;
pub const DEFAULT_MAX_ADDRESS_ATTEMPTS: u32 = 1000;
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 30;

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("MAILHOST_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_or("MAILHOST_PORT", 3000u16)?;
        let env_db = env::var("MAILHOST_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/mailhost.db".into());
        let env_limit = env_or("MAILHOST_DEFAULT_MAILBOX_LIMIT", DEFAULT_MAILBOX_LIMIT)?;
        let env_attempts = env_or("MAILHOST_MAX_ADDRESS_ATTEMPTS", DEFAULT_MAX_ADDRESS_ATTEMPTS)?;
        let env_timeout = env_or("MAILHOST_BATCH_TIMEOUT_SECS", DEFAULT_BATCH_TIMEOUT_SECS)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            default_mailbox_limit: args.default_mailbox_limit.unwrap_or(env_limit),
            max_address_attempts: args.max_address_attempts.unwrap_or(env_attempts),
            batch_timeout_secs: args.batch_timeout_secs.unwrap_or(env_timeout),
        };
        cfg.validate()?;

        Ok((cfg, args.migrate))
    }

    fn validate(&self) -> Result<()> {
        if self.default_mailbox_limit < 0 {
            anyhow::bail!(
                "default mailbox limit must be >= 0, got {}",
                self.default_mailbox_limit
            );
        }
        if self.max_address_attempts == 0 {
            anyhow::bail!("max address attempts must be at least 1");
        }
        if self.batch_timeout_secs == 0 {
            anyhow::bail!("batch timeout must be at least 1 second");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn provisioning_settings(&self) -> ProvisioningSettings {
        ProvisioningSettings {
            max_address_attempts: self.max_address_attempts,
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
        }
    }
}

/// Read and parse `key`, falling back to `default` when the variable is unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
