use crate::domain::model::ProductId;
use crate::domain::port::RepositoryError;

/// ドメイン層のエラー型
/// ビジネスルール違反と在庫エンジンの失敗を表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// 商品・注文・ユーザーが見つからない
    #[error("Not found: {0}")]
    NotFound(String),
    /// 無効な数量（0以下、または数値でない入力）
    #[error("Invalid quantity")]
    InvalidQuantity,
    /// 利用可能在庫の不足
    /// UI側で数量の再選択を促せるよう、構造化された情報を持つ
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },
    /// 競合によるリトライを使い切ってもコミットできなかった
    #[error("Stock transaction failed after {attempts} attempts")]
    TransactionFailed { attempts: u32 },
    /// 所有者のユーザーIDが指定されていない
    #[error("Owning user id is required")]
    OwnershipRequired,
    /// 無効な値
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// ストレージ層のエラー（リトライ対象外）
    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl DomainError {
    /// 在庫不足エラーかどうか
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, DomainError::InsufficientStock { .. })
    }
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        DomainError::Repository(err)
    }
}
