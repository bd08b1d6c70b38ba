// アプリケーション層
// ユースケース（在庫エンジンの呼び出し）と読み取り専用のクエリを提供する

pub mod error;
pub mod service;

pub use error::ApplicationError;
