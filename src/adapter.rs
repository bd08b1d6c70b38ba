pub mod database_config;
pub mod database_error;
pub mod database_migration;
pub mod driven;
pub mod driver;
pub mod server_config;

pub use database_config::{ConfigError, DatabaseConfig};
pub use database_migration::DatabaseMigration;
pub use server_config::{Backend, ServerConfig};

// 環境変数を書き換えるテストを直列化するためのロック
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
