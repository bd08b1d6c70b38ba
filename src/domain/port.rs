// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{
    LedgerEntry, Order, OrderId, Product, ProductDetails, ProductId, Role, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// ログレベル（重要度の低い順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// ロガートレイト
/// ログ出力を抽象化するポート
pub trait Logger: Send + Sync {
    /// デバッグレベルのログを出力
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 情報レベルのログを出力
    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 警告レベルのログを出力
    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// エラーレベルのログを出力
    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );
}

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    /// データベース接続に失敗
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作に失敗
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// データの取得に失敗
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    /// 読み取り後に他のトランザクションが同じレコードを更新した
    /// 読み直して再実行すれば成功しうる
    #[error("Concurrent modification conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

/// 商品の書き込み
#[derive(Debug, Clone, PartialEq)]
pub enum ProductWrite {
    /// 新規登録（同じIDが既に存在すれば競合）
    Insert(Product),
    /// 在庫数・予約数の更新
    /// `Product::version()` が保存済みのバージョンと一致する場合のみ適用される
    Update(Product),
}

/// 注文の書き込み
#[derive(Debug, Clone, PartialEq)]
pub enum OrderWrite {
    /// 新規作成（所有者の名前空間に保存）
    Insert(Order),
    /// 配送情報の更新
    /// `Order::version()` が保存済みのバージョンと一致する場合のみ適用される
    Update(Order),
}

/// 1回の在庫トランザクションで書き込む内容
/// `StockStore::commit` で全件まとめて適用されるか、何も適用されないかのどちらか
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockChangeSet {
    pub products: Vec<ProductWrite>,
    pub ledger_entries: Vec<LedgerEntry>,
    pub order: Option<OrderWrite>,
}

impl StockChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&mut self, product: Product) -> &mut Self {
        self.products.push(ProductWrite::Insert(product));
        self
    }

    pub fn update_product(&mut self, product: Product) -> &mut Self {
        self.products.push(ProductWrite::Update(product));
        self
    }

    pub fn append_ledger(&mut self, entry: LedgerEntry) -> &mut Self {
        self.ledger_entries.push(entry);
        self
    }

    pub fn insert_order(&mut self, order: Order) -> &mut Self {
        self.order = Some(OrderWrite::Insert(order));
        self
    }

    pub fn update_order(&mut self, order: Order) -> &mut Self {
        self.order = Some(OrderWrite::Update(order));
        self
    }
}

/// 在庫ストアトレイト
///
/// `quantity` / `reserved` を書き換えられる唯一の経路。
/// 在庫エンジンだけがこの能力を保持する。
#[async_trait]
pub trait StockStore: Send + Sync {
    /// 指定された商品を読み込む
    /// 存在しない商品は結果に含まれない
    async fn load_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError>;

    /// 所有者の名前空間から注文を読み込む
    async fn load_order(
        &self,
        owner: &UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// 変更をアトミックに適用する
    ///
    /// # Returns
    /// * `Ok(())` - すべての書き込みが適用された
    /// * `Err(RepositoryError::Conflict)` - 読み込み後に他のトランザクションが対象を更新した。何も適用されていない
    /// * `Err(RepositoryError)` - その他の失敗。何も適用されていない
    async fn commit(&self, change_set: StockChangeSet) -> Result<(), RepositoryError>;
}

/// 商品リポジトリトレイト
/// 読み取りと在庫数に関係しないメタデータ操作を提供する
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// 商品IDで商品を検索する
    async fn find_by_id(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// すべての商品を取得する
    /// 作成日時の降順で並べて返す
    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError>;

    /// メタデータを更新する
    /// 数量・予約数・基準数量は変更せず、バージョンだけを進める
    ///
    /// # Returns
    /// * `Ok(true)` - 更新した
    /// * `Ok(false)` - 商品が見つからなかった
    async fn update_details(
        &self,
        product_id: ProductId,
        details: &ProductDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 商品を削除する（台帳は残る）
    ///
    /// # Returns
    /// * `Ok(true)` - 削除した
    /// * `Ok(false)` - 商品が見つからなかった
    async fn delete(&self, product_id: ProductId) -> Result<bool, RepositoryError>;
}

/// 在庫台帳リポジトリトレイト
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// 商品の台帳を日付の降順で取得する
    async fn find_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError>;
}

/// 注文リポジトリトレイト
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 所有者と注文IDで注文を検索する
    async fn find_by_id(
        &self,
        owner: &UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// すべてのユーザーの注文を取得する
    /// 作成日時の降順で並べて返す
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// 指定ユーザーの注文を取得する
    /// 作成日時の降順で並べて返す
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Order>, RepositoryError>;
}

/// ユーザーリポジトリトレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// ユーザーを保存する（存在すれば上書き）
    async fn save(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// すべてのユーザーをメールアドレス順で取得する
    async fn find_all(&self) -> Result<Vec<User>, RepositoryError>;

    /// 役割を更新する
    ///
    /// # Returns
    /// * `Ok(true)` - 更新した
    /// * `Ok(false)` - ユーザーが見つからなかった
    async fn update_role(&self, user_id: &UserId, role: Role) -> Result<bool, RepositoryError>;
}
