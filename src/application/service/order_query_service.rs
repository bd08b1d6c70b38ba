use crate::application::ApplicationError;
use crate::domain::model::{CreatedSource, Order, OrderId, ShippingStatus, UserId};
use crate::domain::port::OrderRepository;
use std::sync::Arc;

/// 管理者向け注文一覧の絞り込み条件
/// Noneの項目は絞り込まない
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub created_source: Option<CreatedSource>,
    pub shipping_status: Option<ShippingStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.created_source
            .map_or(true, |source| order.created_source() == source)
            && self
                .shipping_status
                .map_or(true, |status| order.shipping_status() == status)
    }
}

/// 注文クエリサービス
/// 読み取り専用の注文操作を提供する
pub struct OrderQueryService {
    order_repository: Arc<dyn OrderRepository>,
}

impl OrderQueryService {
    /// 新しい注文クエリサービスを作成
    ///
    /// # Arguments
    /// * `order_repository` - 注文リポジトリ
    pub fn new(order_repository: Arc<dyn OrderRepository>) -> Self {
        Self { order_repository }
    }

    /// 所有者と注文IDで注文を取得
    ///
    /// # Returns
    /// * `Ok(Some(Order))` - 注文が見つかった
    /// * `Ok(None)` - 注文が見つからなかった
    /// * `Err(ApplicationError)` - 取得失敗
    pub async fn get_order(
        &self,
        owner: &UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, ApplicationError> {
        self.order_repository
            .find_by_id(owner, order_id)
            .await
            .map_err(ApplicationError::from)
    }

    /// すべてのユーザーの注文を取得
    /// 作成日時の降順で並べて返す
    pub async fn get_all_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, ApplicationError> {
        let orders = self.order_repository.find_all().await?;
        Ok(orders
            .into_iter()
            .filter(|order| filter.matches(order))
            .collect())
    }

    /// 指定ユーザーの注文を取得
    /// 作成日時の降順で並べて返す
    pub async fn get_orders_for_user(&self, owner: &UserId) -> Result<Vec<Order>, ApplicationError> {
        self.order_repository
            .find_by_owner(owner)
            .await
            .map_err(ApplicationError::from)
    }
}
