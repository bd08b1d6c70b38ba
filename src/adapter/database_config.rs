use std::env;

/// データベース接続設定を管理する構造体
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// 環境変数を読み取り、未設定ならデフォルト値を使う
pub(crate) fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    /// 環境変数から設定を読み取る
    /// 環境変数が設定されていない場合はデフォルト値を使用
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or("DATABASE_HOST", "localhost".to_string())?,
            port: env_or("DATABASE_PORT", 3306)?,
            database: env_or("DATABASE_NAME", "stock_fulfillment_db".to_string())?,
            username: env_or("DATABASE_USER", "stock_user".to_string())?,
            password: env_or("DATABASE_PASSWORD", "stock_password".to_string())?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
        })
    }

    /// MySQL接続文字列を生成
    pub fn connection_string(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}
