use std::time::Duration;

use anyhow::bail;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use internhub_identity::{DisplayId, RoleCode};
use internhub_infra::AllocatorConfig;
use internhub_observability::LogFormat;

/// Administrative commands for the identity store.
///
/// Every setting can also come from the environment (or a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "internhub-admin",
    version,
    about = "Manage InternHub identities and Smart IDs"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Postgres connection string.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL", global = true, default_value = "")]
    pub database_url: String,

    /// Read-increment-write attempts per allocation before giving up.
    ///
    /// Environment variable: `ALLOC_MAX_ATTEMPTS`
    #[arg(long, env = "ALLOC_MAX_ATTEMPTS", global = true, default_value_t = 5)]
    pub max_attempts: u32,

    /// Longest wait, in milliseconds, for the allocation counter lock.
    ///
    /// Environment variable: `ALLOC_LOCK_TIMEOUT_MS`
    #[arg(long, env = "ALLOC_LOCK_TIMEOUT_MS", global = true, default_value_t = 2_000)]
    pub lock_timeout_ms: u64,

    /// Base pause, in milliseconds, between allocation retries.
    ///
    /// Environment variable: `ALLOC_RETRY_BACKOFF_MS`
    #[arg(long, env = "ALLOC_RETRY_BACKOFF_MS", global = true, default_value_t = 10)]
    pub retry_backoff_ms: u64,

    /// `json` or `pretty`.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", global = true, default_value = "json")]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the identity tables if they are missing.
    Migrate,

    /// Create the first super admin, unless one already exists.
    ///
    /// Only the identity is created. No password or login credential is
    /// issued; that belongs to the authentication service.
    Genesis {
        #[arg(long, default_value = "root@smg.com")]
        email: String,
        #[arg(long, default_value = "Genesis")]
        first_name: String,
        #[arg(long, default_value = "Admin")]
        last_name: String,
    },

    /// Create an account and print its record.
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// INT, ADM or SUP.
        #[arg(long, default_value = "INT")]
        role: RoleCode,
        /// Defaults to "General".
        #[arg(long)]
        department: Option<String>,
    },

    /// Print the record behind a display id.
    Show { display_id: DisplayId },

    /// Print every record allocated for a role on a day.
    List {
        #[arg(long, default_value = "INT")]
        role: RoleCode,
        /// `YYYY-MM-DD`, today (UTC) when omitted.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: String,
    pub allocator: AllocatorConfig,
    pub log_format: LogFormat,
}

impl TryFrom<Settings> for AdminConfig {
    type Error = anyhow::Error;

    fn try_from(settings: Settings) -> Result<Self, Self::Error> {
        if settings.database_url.trim().is_empty() {
            bail!("DATABASE_URL must be set");
        }

        let allocator = AllocatorConfig {
            max_attempts: settings.max_attempts,
            lock_timeout: Duration::from_millis(settings.lock_timeout_ms),
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        };
        if let Err(e) = allocator.validate() {
            bail!("invalid allocator settings: {e}");
        }

        Ok(Self {
            database_url: settings.database_url,
            allocator,
            log_format: settings.log_format,
        })
    }
}
