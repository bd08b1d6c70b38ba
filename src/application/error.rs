use crate::domain::error::DomainError;
use crate::domain::port::RepositoryError;

/// アプリケーション層のエラー型
/// ドメインエラーとリポジトリエラーをラップする
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// ドメインエラー（ビジネスルール違反・在庫エンジンの失敗）
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
    /// リポジトリエラー（永続化の失敗）
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
    /// エンティティが見つからない
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApplicationError {
    /// 在庫不足エラーかどうか
    /// UI側で数量の再選択を促すかどうかの判定に使う
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, ApplicationError::DomainError(err) if err.is_insufficient_stock())
    }
}
