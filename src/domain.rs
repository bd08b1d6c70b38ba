// ドメイン層
// 在庫・台帳・注文のビジネスルールと、外部に依存する機能のポートを定義する

pub mod error;
pub mod model;
pub mod port;
pub mod retry;
pub mod service;
