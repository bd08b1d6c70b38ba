use crate::application::ApplicationError;
use crate::domain::model::{
    AdjustDirection, Order, OrderDraft, OrderId, Product, ProductDetails, ProductId,
    ShippingUpdate, UserId,
};
use crate::domain::port::ProductRepository;
use crate::domain::service::StockEngine;
use chrono::Utc;
use std::sync::Arc;

mod order_query_service;
mod product_query_service;
mod user_service;

pub use order_query_service::{OrderFilter, OrderQueryService};
pub use product_query_service::ProductQueryService;
pub use user_service::UserService;

/// 商品アプリケーションサービス
/// 在庫数の変更は在庫エンジンに委譲し、メタデータの操作だけを直接リポジトリに行う
pub struct ProductApplicationService {
    engine: Arc<StockEngine>,
    product_repository: Arc<dyn ProductRepository>,
}

impl ProductApplicationService {
    /// 新しい商品アプリケーションサービスを作成
    ///
    /// # Arguments
    /// * `engine` - 在庫エンジン
    /// * `product_repository` - 商品リポジトリ
    pub fn new(engine: Arc<StockEngine>, product_repository: Arc<dyn ProductRepository>) -> Self {
        Self {
            engine,
            product_repository,
        }
    }

    /// 商品を登録
    ///
    /// # Arguments
    /// * `details` - 商品のメタデータ
    /// * `quantity` - 初期在庫数（基準数量にもなる）
    ///
    /// # Returns
    /// * `Ok(ProductId)` - 登録された商品のID
    /// * `Err(ApplicationError)` - 登録失敗
    pub async fn register_product(
        &self,
        details: ProductDetails,
        quantity: u32,
    ) -> Result<ProductId, ApplicationError> {
        Ok(self.engine.register_product(details, quantity).await?)
    }

    /// 商品のメタデータを更新
    /// 在庫数・予約数・基準数量は変更されない
    ///
    /// # Returns
    /// * `Ok(Product)` - 更新後の商品
    /// * `Err(ApplicationError::NotFound)` - 商品が存在しない
    pub async fn update_product_details(
        &self,
        product_id: ProductId,
        details: ProductDetails,
    ) -> Result<Product, ApplicationError> {
        details.validate()?;

        let updated = self
            .product_repository
            .update_details(product_id, &details, Utc::now())
            .await?;
        if !updated {
            return Err(not_found_product(product_id));
        }

        self.product_repository
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| not_found_product(product_id))
    }

    /// 商品を削除
    /// 台帳は監査記録として残る
    pub async fn delete_product(&self, product_id: ProductId) -> Result<(), ApplicationError> {
        if self.product_repository.delete(product_id).await? {
            Ok(())
        } else {
            Err(not_found_product(product_id))
        }
    }

    /// 在庫数を手動で調整
    ///
    /// # Arguments
    /// * `product_id` - 商品ID
    /// * `delta` - 変更量（1以上）
    /// * `direction` - 増減の方向
    pub async fn adjust_quantity(
        &self,
        product_id: ProductId,
        delta: u32,
        direction: AdjustDirection,
    ) -> Result<Product, ApplicationError> {
        Ok(self
            .engine
            .adjust_quantity(product_id, delta, direction)
            .await?)
    }
}

fn not_found_product(product_id: ProductId) -> ApplicationError {
    ApplicationError::NotFound(format!("商品が見つかりません: {}", product_id))
}

/// 注文アプリケーションサービス
pub struct OrderApplicationService {
    engine: Arc<StockEngine>,
}

impl OrderApplicationService {
    pub fn new(engine: Arc<StockEngine>) -> Self {
        Self { engine }
    }

    /// 注文を作成
    ///
    /// # Returns
    /// * `Ok(OrderId)` - 作成された注文のID
    /// * `Err(ApplicationError)` - 在庫不足などで作成失敗（在庫は変化しない）
    pub async fn create_order(&self, draft: OrderDraft) -> Result<OrderId, ApplicationError> {
        Ok(self.engine.create_order(draft).await?)
    }

    /// 配送情報を更新
    /// 初めて配送完了になった場合は予約が確定的な在庫減に変換される
    ///
    /// # Arguments
    /// * `order_id` - 注文ID
    /// * `owner` - 注文の所有者（未指定は `OwnershipRequired`）
    /// * `update` - 配送業者・追跡番号・ステータス
    pub async fn update_shipping(
        &self,
        order_id: OrderId,
        owner: Option<UserId>,
        update: ShippingUpdate,
    ) -> Result<Order, ApplicationError> {
        Ok(self.engine.update_shipping(order_id, owner, update).await?)
    }
}
