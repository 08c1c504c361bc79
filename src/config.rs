//! Service configuration.
//!
//! Environment variables:
//! - `HOST`: bind address (default: 0.0.0.0)
//! - `PORT`: bind port (default: 5000)
//! - `LOG_FORMAT`: "json" or "pretty" (default: json)
//! - `REPORT_DIR`: directory for spooled reports (default: `$TMPDIR/esg-reports`)
//! - `BATCH_MAX_ATTEMPTS`: attempts per lock-contended update (default: 3)
//! - `BATCH_RETRY_DELAY_MS`: delay between attempts (default: 500)
//! - `CORS_ALLOWED_ORIGIN`: allowed origin, `*` for any (default: *)

use std::path::PathBuf;
use std::time::Duration;

use crate::batch::RetryPolicy;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON, one object per event.
    Json,
    /// Human-readable output for development.
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("pretty") {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Log output format.
    pub log_format: LogFormat,
    /// Directory for spooled report files.
    pub report_dir: PathBuf,
    /// Retry policy for batch updates.
    pub retry: RetryPolicy,
    /// Allowed CORS origin; `None` allows any.
    pub cors_origin: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let max_attempts = parsed("BATCH_MAX_ATTEMPTS")
            .map(|v| v as u32)
            .unwrap_or(RetryPolicy::DEFAULT_MAX_ATTEMPTS);
        let delay = parsed("BATCH_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(RetryPolicy::DEFAULT_DELAY);

        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("PORT").and_then(|p| u16::try_from(p).ok()).unwrap_or(5000),
            log_format: lookup("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(LogFormat::Json),
            report_dir: lookup("REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("esg-reports")),
            retry: RetryPolicy::new(max_attempts, delay),
            cors_origin: lookup("CORS_ALLOWED_ORIGIN").filter(|o| o != "*" && !o.is_empty()),
        }
    }

    /// `host:port` string.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
