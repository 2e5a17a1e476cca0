use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Receipts,
    Contracts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptSink {
    Csv,
    Postgres,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing env var: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: AppMode,

    pub rpc_url: Option<String>,
    pub database_url: Option<String>,

    // pacing
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub rpc_timeout: Duration,
    pub progress_every: usize,

    // contracts mode
    pub source_limit: i64,
    pub register_limit: i64,
    pub max_passes: usize,
    pub sender_table: Option<String>,

    // receipts mode
    pub receipt_sink: ReceiptSink,
    pub receipts_input: Option<PathBuf>,
    pub receipts_output: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let cfg = Self::from_lookup(|key| env::var(key).ok())?;

        log::info!("APP_MODE={:?}", cfg.mode);
        log::info!(
            "BATCH_SIZE={} BATCH_DELAY={:?} RPC_TIMEOUT={:?}",
            cfg.batch_size,
            cfg.batch_delay,
            cfg.rpc_timeout
        );
        Ok(cfg)
    }

    /// Builds the config from any variable source. Only `from_env` touches
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match get("APP_MODE").as_deref().map(str::trim) {
            Some("receipts") => AppMode::Receipts,
            Some("contracts") => AppMode::Contracts,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_MODE",
                    value: other.to_string(),
                })
            }
            None => return Err(ConfigError::Missing("APP_MODE")),
        };

        // receipts ran against a slower archive endpoint, contracts against latest state
        let (batch_size, delay_ms, timeout_secs) = match mode {
            AppMode::Receipts => (50, 500, 15),
            AppMode::Contracts => (100, 1000, 10),
        };

        let batch_size = parse_or(&get, "BATCH_SIZE", batch_size)?;

        let receipt_sink = match get("RECEIPT_SINK").as_deref().map(str::trim) {
            None | Some("csv") => ReceiptSink::Csv,
            Some("postgres") => ReceiptSink::Postgres,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "RECEIPT_SINK",
                    value: other.to_string(),
                })
            }
        };

        let sender_table = match lookup("SENDER_SOURCE_TABLE") {
            None => Some("raw_unichain_swaps".to_string()),
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(parse_identifier("SENDER_SOURCE_TABLE", v.trim())?),
        };

        let cfg = Self {
            mode,
            rpc_url: get("RPC_URL"),
            database_url: get("DATABASE_URL"),

            batch_size,
            batch_delay: Duration::from_millis(parse_or(&get, "BATCH_DELAY_MS", delay_ms)?),
            rpc_timeout: Duration::from_secs(parse_or(&get, "RPC_TIMEOUT_SECONDS", timeout_secs)?),
            progress_every: parse_or(&get, "PROGRESS_EVERY", 10)?,

            source_limit: parse_or(&get, "SOURCE_LIMIT", batch_size as i64)?,
            register_limit: parse_or(&get, "REGISTER_LIMIT", 1000)?,
            max_passes: parse_or(&get, "MAX_SOURCE_PASSES", 10_000)?,
            sender_table,

            receipt_sink,
            receipts_input: get("RECEIPTS_INPUT").map(PathBuf::from),
            receipts_output: get("RECEIPTS_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tx_receipts.csv")),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("BATCH_SIZE"));
        }
        if self.progress_every == 0 {
            return Err(ConfigError::Zero("PROGRESS_EVERY"));
        }
        if self.rpc_timeout.is_zero() {
            return Err(ConfigError::Zero("RPC_TIMEOUT_SECONDS"));
        }
        if self.source_limit <= 0 {
            return Err(ConfigError::Zero("SOURCE_LIMIT"));
        }
        if self.register_limit <= 0 {
            return Err(ConfigError::Zero("REGISTER_LIMIT"));
        }
        if self.max_passes == 0 {
            return Err(ConfigError::Zero("MAX_SOURCE_PASSES"));
        }
        Ok(())
    }

    pub fn require_rpc_url(&self) -> Result<&str, ConfigError> {
        self.rpc_url.as_deref().ok_or(ConfigError::Missing("RPC_URL"))
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
        }),
    }
}

// table names are spliced into SQL, so only plain identifiers pass
fn parse_identifier(key: &'static str, value: &str) -> Result<String, ConfigError> {
    let valid = value
        .split('.')
        .all(|part| {
            !part.is_empty()
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !part.starts_with(|c: char| c.is_ascii_digit())
        });

    if valid {
        Ok(value.to_string())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}
