use crate::adapter::database_config::{env_or, ConfigError};
use crate::domain::port::LogLevel;
use crate::domain::retry::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;

/// 永続化の実装
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql,
    /// プロセス内のインメモリストア（デモ用、再起動で消える）
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(Backend::MySql),
            "memory" => Ok(Backend::Memory),
            other => Err(format!("unknown backend '{}' (expected mysql or memory)", other)),
        }
    }
}

/// LOG_LEVELの値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogLevelSetting(LogLevel);

impl FromStr for LogLevelSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            other => return Err(format!("unknown log level '{}'", other)),
        };
        Ok(Self(level))
    }
}

/// サーバー全体の設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub backend: Backend,
    pub log_level: LogLevel,
    pub retry_policy: RetryPolicy,
}

impl ServerConfig {
    /// 環境変数から設定を読み取る
    ///
    /// * `SERVER_BIND_ADDRESS` - 待ち受けアドレス（既定 `0.0.0.0:3000`）
    /// * `BACKEND` - `mysql` または `memory`（既定 `mysql`）
    /// * `LOG_LEVEL` - `debug` / `info` / `warn` / `error`（既定 `info`）
    /// * `STOCK_TX_MAX_ATTEMPTS` - 在庫トランザクションの最大試行回数（既定 5）
    /// * `STOCK_TX_BASE_BACKOFF_MS` / `STOCK_TX_MAX_BACKOFF_MS` - 再試行の待機時間（既定 10 / 500）
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_attempts = env_or("STOCK_TX_MAX_ATTEMPTS", RetryPolicy::DEFAULT_MAX_ATTEMPTS)?;
        let base_backoff_ms = env_or(
            "STOCK_TX_BASE_BACKOFF_MS",
            RetryPolicy::DEFAULT_BASE_BACKOFF.as_millis() as u64,
        )?;
        let max_backoff_ms = env_or(
            "STOCK_TX_MAX_BACKOFF_MS",
            RetryPolicy::DEFAULT_MAX_BACKOFF.as_millis() as u64,
        )?;

        let retry_policy = RetryPolicy::new(
            max_attempts,
            Duration::from_millis(base_backoff_ms),
            Duration::from_millis(max_backoff_ms),
        )
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid stock retry settings: {}", e)))?;

        Ok(Self {
            bind_address: env_or("SERVER_BIND_ADDRESS", "0.0.0.0:3000".to_string())?,
            backend: env_or("BACKEND", Backend::MySql)?,
            log_level: env_or("LOG_LEVEL", LogLevelSetting(LogLevel::Info))?.0,
            retry_policy,
        })
    }
}
