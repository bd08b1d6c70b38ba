// ドメインサービス
// 複数の商品・注文にまたがる在庫の予約と出荷確定を担当する

use crate::domain::error::DomainError;
use crate::domain::model::{
    AdjustDirection, DeliveryMethod, LedgerEntry, Money, MovementSource, Order, OrderDraft,
    OrderId, OrderItem, Product, ProductDetails, ProductId, ShippingTransition, ShippingUpdate,
    UserId,
};
use crate::domain::port::{Logger, RepositoryError, StockChangeSet, StockStore};
use crate::domain::retry::RetryPolicy;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const COMPONENT: &str = "StockEngine";

/// 在庫予約・出荷確定エンジン
///
/// 在庫数・予約数を変更する操作はすべてここを通る。各操作は
/// 「読み込み → 検証 → 変更セットの組み立て → コミット」を1トランザクションとして実行し、
/// 読み込み後に他のトランザクションが対象を更新していた場合は読み直して再実行する。
pub struct StockEngine {
    store: Arc<dyn StockStore>,
    retry_policy: RetryPolicy,
    logger: Arc<dyn Logger>,
}

impl StockEngine {
    /// 新しい在庫エンジンを作成
    ///
    /// # Arguments
    /// * `store` - 在庫ストア（在庫数を書き換える唯一の経路）
    /// * `retry_policy` - 競合時の再試行ポリシー
    /// * `logger` - ロガー
    pub fn new(
        store: Arc<dyn StockStore>,
        retry_policy: RetryPolicy,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            store,
            retry_policy,
            logger,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// 商品を登録する
    /// 数量が1以上で仕入単価がある場合は仕入日付で入庫を台帳に記録する
    pub async fn register_product(
        &self,
        details: ProductDetails,
        quantity: u32,
    ) -> Result<ProductId, DomainError> {
        let product = Product::register(ProductId::new(), details, quantity, Utc::now())?;
        let product = &product;

        self.run_transaction("register_product", move || async move {
            let mut change_set = StockChangeSet::new();
            if let (true, Some(cost_price)) = (product.quantity() > 0, product.cost_price()) {
                change_set.append_ledger(LedgerEntry::stock_in(
                    product.id(),
                    product.quantity(),
                    Some(cost_price),
                    MovementSource::AdminAdd,
                    product.details().purchase_date,
                ));
            }
            change_set.insert_product(product.clone());
            Ok((change_set, product.id()))
        })
        .await
    }

    /// 入庫する（在庫数を増やし、現在の仕入単価で台帳に記録）
    pub async fn restock(&self, product_id: ProductId, delta: u32) -> Result<Product, DomainError> {
        self.adjust_quantity(product_id, delta, AdjustDirection::Increase)
            .await
    }

    /// 手動で在庫を減らす（原価なしで台帳に記録、予約数には触れない）
    pub async fn adjust_down(
        &self,
        product_id: ProductId,
        delta: u32,
    ) -> Result<Product, DomainError> {
        self.adjust_quantity(product_id, delta, AdjustDirection::Decrease)
            .await
    }

    /// 在庫数を手動で調整する
    ///
    /// # Returns
    /// * `Ok(Product)` - 調整後の商品
    /// * `Err(DomainError::NotFound)` - 商品が存在しない
    /// * `Err(DomainError::InvalidQuantity)` - 数量が0
    pub async fn adjust_quantity(
        &self,
        product_id: ProductId,
        delta: u32,
        direction: AdjustDirection,
    ) -> Result<Product, DomainError> {
        if delta == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        let operation = match direction {
            AdjustDirection::Increase => "restock",
            AdjustDirection::Decrease => "adjust_down",
        };

        self.run_transaction(operation, move || {
            self.plan_adjustment(product_id, delta, direction)
        })
        .await
    }

    /// 注文を作成する
    ///
    /// カート内の全商品の利用可能数を同じトランザクション内で検証し、
    /// 1つでも不足していれば何も変更せずに `InsufficientStock` を返す。
    /// 配送は予約数を増やし、店頭受け取りは在庫数を直接減らして台帳に出庫を記録する。
    pub async fn create_order(&self, draft: OrderDraft) -> Result<OrderId, DomainError> {
        let owner = draft
            .created_by_uid
            .clone()
            .ok_or(DomainError::OwnershipRequired)?;
        draft.validate_quantities()?;
        let requested = draft.requested_per_product()?;
        let order_id = OrderId::new();

        let (draft, owner, requested) = (&draft, &owner, requested.as_slice());
        self.run_transaction("create_order", move || {
            self.plan_order_creation(order_id, owner, draft, requested)
        })
        .await?;

        Ok(order_id)
    }

    /// 配送情報を更新する
    ///
    /// 初めて配送完了に遷移する場合は、同じトランザクションで各商品の予約を
    /// 確定的な在庫減に変換し、台帳に出庫を記録する。既に配送完了の注文では
    /// 在庫は変化しない。
    pub async fn update_shipping(
        &self,
        order_id: OrderId,
        owner: Option<UserId>,
        update: ShippingUpdate,
    ) -> Result<Order, DomainError> {
        let owner = owner.ok_or(DomainError::OwnershipRequired)?;

        let (owner, update) = (&owner, &update);
        self.run_transaction("update_shipping", move || {
            self.plan_shipping_update(order_id, owner, update)
        })
        .await
    }

    async fn load_product(&self, product_id: ProductId) -> Result<Product, DomainError> {
        self.store
            .load_products(&[product_id])
            .await?
            .remove(&product_id)
            .ok_or_else(|| DomainError::NotFound(format!("商品が見つかりません: {}", product_id)))
    }

    async fn plan_adjustment(
        &self,
        product_id: ProductId,
        delta: u32,
        direction: AdjustDirection,
    ) -> Result<(StockChangeSet, Product), DomainError> {
        let mut product = self.load_product(product_id).await?;
        let now = Utc::now();
        let mut change_set = StockChangeSet::new();

        match direction {
            AdjustDirection::Increase => {
                product.restock(delta, now)?;
                change_set.append_ledger(LedgerEntry::stock_in(
                    product_id,
                    delta,
                    product.cost_price(),
                    MovementSource::AdminAdjustInc,
                    now,
                ));
            }
            AdjustDirection::Decrease => {
                let removed = product.adjust_down(delta, now)?;
                if removed > 0 {
                    change_set.append_ledger(LedgerEntry::stock_out(
                        product_id,
                        removed,
                        None,
                        MovementSource::AdminAdjustDec,
                        now,
                    ));
                }
            }
        }

        change_set.update_product(product.clone());
        Ok((change_set, product.committed()))
    }

    async fn plan_order_creation(
        &self,
        order_id: OrderId,
        owner: &UserId,
        draft: &OrderDraft,
        requested: &[(ProductId, u32)],
    ) -> Result<(StockChangeSet, ()), DomainError> {
        let product_ids: Vec<ProductId> = requested.iter().map(|(id, _)| *id).collect();
        let mut products = self.store.load_products(&product_ids).await?;
        let now = Utc::now();
        let mut change_set = StockChangeSet::new();
        let mut snapshots: HashMap<ProductId, (String, Money)> = HashMap::new();

        for &(product_id, quantity) in requested {
            let mut product = products.remove(&product_id).ok_or_else(|| {
                DomainError::NotFound(format!("商品が見つかりません: {}", product_id))
            })?;

            match draft.delivery_method {
                DeliveryMethod::Shipping => {
                    product.reserve(quantity, now)?;
                }
                DeliveryMethod::Pickup => {
                    product.withdraw(quantity, now)?;
                    change_set.append_ledger(
                        LedgerEntry::stock_out(
                            product_id,
                            quantity,
                            product.cost_price(),
                            draft.created_source.pickup_source(),
                            now,
                        )
                        .for_order(order_id, owner.clone()),
                    );
                }
            }

            snapshots.insert(
                product_id,
                (
                    product.name().to_string(),
                    product.cost_price().unwrap_or_else(Money::zero),
                ),
            );
            change_set.update_product(product);
        }

        let items = draft
            .lines
            .iter()
            .map(|line| {
                let (name, unit_price) = snapshots.get(&line.product_id).ok_or_else(|| {
                    DomainError::NotFound(format!("商品が見つかりません: {}", line.product_id))
                })?;
                OrderItem::new(line.product_id, name.clone(), *unit_price, line.quantity)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let order = Order::create(order_id, owner.clone(), items, draft, now)?;
        change_set.insert_order(order);
        Ok((change_set, ()))
    }

    async fn plan_shipping_update(
        &self,
        order_id: OrderId,
        owner: &UserId,
        update: &ShippingUpdate,
    ) -> Result<(StockChangeSet, Order), DomainError> {
        let mut order = self
            .store
            .load_order(owner, order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("注文が見つかりません: {}", order_id)))?;
        let now = Utc::now();
        let mut change_set = StockChangeSet::new();

        if order.apply_shipping_update(update, now) == ShippingTransition::Fulfilled {
            let quantities = order.quantities_per_product();
            let product_ids: Vec<ProductId> = quantities.iter().map(|(id, _)| *id).collect();
            let mut products = self.store.load_products(&product_ids).await?;
            let source = order.created_source().ship_success_source();

            for (product_id, quantity) in quantities {
                // 削除済みの商品は在庫処理の対象外
                let Some(mut product) = products.remove(&product_id) else {
                    continue;
                };
                let removed = product.fulfill_reservation(quantity, now);
                if removed > 0 {
                    change_set.append_ledger(
                        LedgerEntry::stock_out(
                            product_id,
                            removed,
                            product.cost_price(),
                            source,
                            now,
                        )
                        .for_order(order_id, owner.clone()),
                    );
                }
                change_set.update_product(product);
            }
        }

        change_set.update_order(order.clone());
        Ok((change_set, order.committed()))
    }

    /// 変更セットを組み立ててコミットする
    ///
    /// 競合した場合は `plan` を呼び直して最新の状態から組み立て直す。
    /// 業務エラー（在庫不足など）は再試行せずにそのまま返す。
    async fn run_transaction<T, F, Fut>(&self, operation: &str, mut plan: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(StockChangeSet, T), DomainError>>,
    {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();
        let max_attempts = self.retry_policy.max_attempts();

        for attempt in 1..=max_attempts {
            let conflict = match plan().await {
                Ok((change_set, value)) => {
                    let ledger_entries = change_set.ledger_entries.len();
                    match self.store.commit(change_set).await {
                        Ok(()) => {
                            self.logger.info(
                                COMPONENT,
                                &format!("{} committed", operation),
                                Some(correlation_id),
                                Some(context(&[
                                    ("operation", operation.to_string()),
                                    ("attempt", attempt.to_string()),
                                    ("ledger_entries", ledger_entries.to_string()),
                                    ("elapsed", format!("{:?}", started.elapsed())),
                                ])),
                            );
                            return Ok(value);
                        }
                        Err(RepositoryError::Conflict(reason)) => reason,
                        Err(err) => {
                            self.logger.error(
                                COMPONENT,
                                &format!("{} commit failed: {}", operation, err),
                                Some(correlation_id),
                                Some(context(&[
                                    ("operation", operation.to_string()),
                                    ("attempt", attempt.to_string()),
                                ])),
                            );
                            return Err(DomainError::Repository(err));
                        }
                    }
                }
                Err(DomainError::Repository(RepositoryError::Conflict(reason))) => reason,
                Err(err) => {
                    self.logger.info(
                        COMPONENT,
                        &format!("{} rejected: {}", operation, err),
                        Some(correlation_id),
                        Some(context(&[
                            ("operation", operation.to_string()),
                            ("attempt", attempt.to_string()),
                        ])),
                    );
                    return Err(err);
                }
            };

            self.logger.warn(
                COMPONENT,
                &format!("{} conflicted, retrying: {}", operation, conflict),
                Some(correlation_id),
                Some(context(&[
                    ("operation", operation.to_string()),
                    ("attempt", attempt.to_string()),
                    ("max_attempts", max_attempts.to_string()),
                ])),
            );

            if attempt < max_attempts {
                tokio::time::sleep(self.retry_policy.backoff_for(attempt)).await;
            }
        }

        self.logger.error(
            COMPONENT,
            &format!("{} gave up after {} attempts", operation, max_attempts),
            Some(correlation_id),
            Some(context(&[
                ("operation", operation.to_string()),
                ("elapsed", format!("{:?}", started.elapsed())),
            ])),
        );
        Err(DomainError::TransactionFailed {
            attempts: max_attempts,
        })
    }
}

fn context(pairs: &[(&str, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
