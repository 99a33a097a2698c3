use clap::{Parser, Subcommand, ValueEnum};
use lapse_core::expiry::DEFAULT_TTL_DAYS;
use lapse_shortener::service::DEFAULT_MAX_ATTEMPTS;
use lapse_shortener::sweeper::DEFAULT_SWEEP_INTERVAL;
use std::fmt::{Display, Formatter};

pub const MYSQL_DSN_ENV: &str = "LAPSE_MYSQL_DSN";
pub const LOG_FORMAT_ENV: &str = "LAPSE_LOG_FORMAT";
pub const MAX_ATTEMPTS_ENV: &str = "LAPSE_MAX_ATTEMPTS";
pub const DEFAULT_TTL_DAYS_ENV: &str = "LAPSE_DEFAULT_TTL_DAYS";
pub const SWEEP_INTERVAL_ENV: &str = "LAPSE_SWEEP_INTERVAL_SECS";

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = DEFAULT_SWEEP_INTERVAL.as_secs();

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "lapse", about = "Expiring short links backed by MySQL")]
pub struct CLI {
    #[arg(long, env = MYSQL_DSN_ENV)]
    pub mysql_dsn: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    /// Candidate codes to try before giving up on a single `shorten`.
    #[arg(long, env = MAX_ATTEMPTS_ENV, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Lifetime of a link created without `--ttl-days`.
    #[arg(long, env = DEFAULT_TTL_DAYS_ENV, default_value_t = DEFAULT_TTL_DAYS)]
    pub default_ttl_days: i64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the `short_urls` table if it is missing.
    Migrate,
    /// Shorten a URL and print its code.
    Shorten {
        url: String,
        #[arg(long)]
        ttl_days: Option<i64>,
    },
    /// Print the URL a code points to.
    Resolve { code: String },
    /// Print every unexpired record.
    List {
        /// Print one JSON object per line.
        #[arg(long)]
        json: bool,
        /// List the expired records awaiting a sweep instead.
        #[arg(long)]
        expired: bool,
    },
    /// Delete every expired record once and print how many were removed.
    Cleanup,
    /// Delete expired records periodically until interrupted.
    Sweep {
        #[arg(long, env = SWEEP_INTERVAL_ENV, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
        interval_secs: u64,
    },
}
