use crate::application::ApplicationError;
use crate::domain::model::{LedgerEntry, LedgerSummary, Product, ProductId};
use crate::domain::port::{LedgerRepository, ProductRepository};
use std::sync::Arc;

/// 商品クエリサービス
/// 商品・在庫台帳の読み取り専用の操作を提供する
pub struct ProductQueryService {
    product_repository: Arc<dyn ProductRepository>,
    ledger_repository: Arc<dyn LedgerRepository>,
}

impl ProductQueryService {
    /// 新しい商品クエリサービスを作成
    ///
    /// # Arguments
    /// * `product_repository` - 商品リポジトリ
    /// * `ledger_repository` - 在庫台帳リポジトリ
    pub fn new(
        product_repository: Arc<dyn ProductRepository>,
        ledger_repository: Arc<dyn LedgerRepository>,
    ) -> Self {
        Self {
            product_repository,
            ledger_repository,
        }
    }

    /// 商品IDで商品を取得
    ///
    /// # Returns
    /// * `Ok(Some(Product))` - 商品が見つかった
    /// * `Ok(None)` - 商品が見つからなかった
    /// * `Err(ApplicationError)` - 取得失敗
    pub async fn get_product_by_id(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Product>, ApplicationError> {
        self.product_repository
            .find_by_id(product_id)
            .await
            .map_err(ApplicationError::from)
    }

    /// すべての商品を取得
    /// 作成日時の降順で並べて返す
    pub async fn get_all_products(&self) -> Result<Vec<Product>, ApplicationError> {
        self.product_repository
            .find_all()
            .await
            .map_err(ApplicationError::from)
    }

    /// 在庫が少ない商品を取得
    /// 利用可能数が基準数量の20%未満の商品を、作成日時の降順で返す
    pub async fn get_low_stock_products(&self) -> Result<Vec<Product>, ApplicationError> {
        let products = self.product_repository.find_all().await?;
        Ok(products
            .into_iter()
            .filter(|product| product.is_low_stock())
            .collect())
    }

    /// 商品の在庫台帳を日付の降順で取得
    /// 削除済みの商品でも台帳は参照できる
    pub async fn get_ledger(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, ApplicationError> {
        self.ledger_repository
            .find_by_product(product_id)
            .await
            .map_err(ApplicationError::from)
    }

    /// 在庫台帳の入出庫の集計
    pub async fn get_ledger_summary(
        &self,
        product_id: ProductId,
    ) -> Result<LedgerSummary, ApplicationError> {
        let entries = self.ledger_repository.find_by_product(product_id).await?;
        Ok(LedgerSummary::from_entries(&entries)?)
    }
}
